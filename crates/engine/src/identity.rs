use cartsync_core::UserId;

/// One emission from the authentication collaborator.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct IdentityEvent {
    pub identity: Option<UserId>,
    /// False until the collaborator has finished resolving who is signed in.
    pub ready: bool,
}

impl IdentityEvent {
    pub fn pending() -> Self {
        Self::default()
    }

    pub fn signed_in(user: UserId) -> Self {
        Self {
            identity: Some(user),
            ready: true,
        }
    }

    pub fn signed_out() -> Self {
        Self {
            identity: None,
            ready: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum IdentityState {
    #[default]
    Unauthenticated,
    Authenticated(UserId),
}

impl IdentityState {
    pub fn user(&self) -> Option<&UserId> {
        match self {
            Self::Unauthenticated => None,
            Self::Authenticated(user) => Some(user),
        }
    }

    pub fn is_authenticated(&self) -> bool {
        matches!(self, Self::Authenticated(_))
    }

    /// The work needed to move from `self` to `next`.
    pub fn transition_to(&self, next: Option<&UserId>) -> Transition {
        match (self, next) {
            (Self::Unauthenticated, Some(user)) => Transition::Login(user.clone()),
            (Self::Authenticated(user), None) => Transition::Logout(user.clone()),
            (Self::Authenticated(from), Some(to)) if from != to => Transition::Switch {
                from: from.clone(),
                to: to.clone(),
            },
            _ => Transition::None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    None,
    Login(UserId),
    Logout(UserId),
    /// A different user signed in without an intervening sign-out.
    Switch { from: UserId, to: UserId },
}

/// Filters identity emissions: nothing passes until the first `ready`
/// emission, after which only changes of identity pass.
#[derive(Debug, Default)]
pub struct ReadinessGate {
    ready_seen: bool,
    last: Option<UserId>,
}

impl ReadinessGate {
    pub fn new() -> Self {
        Self::default()
    }

    /// `Some(identity)` when the orchestrator should act on `event`.
    pub fn admit(&mut self, event: &IdentityEvent) -> Option<Option<UserId>> {
        if !event.ready {
            return None;
        }
        if self.ready_seen && self.last == event.identity {
            return None;
        }
        self.ready_seen = true;
        self.last = event.identity.clone();
        Some(event.identity.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn user(name: &str) -> UserId {
        UserId::new(name).unwrap()
    }

    #[test]
    fn ignores_until_ready() {
        let mut gate = ReadinessGate::new();
        assert_eq!(gate.admit(&IdentityEvent::pending()), None);
        assert_eq!(
            gate.admit(&IdentityEvent {
                identity: Some(user("a")),
                ready: false,
            }),
            None
        );
        assert_eq!(gate.admit(&IdentityEvent::signed_out()), Some(None));
    }

    #[test]
    fn only_changes_pass_after_first_ready() {
        let mut gate = ReadinessGate::new();
        assert_eq!(
            gate.admit(&IdentityEvent::signed_in(user("a"))),
            Some(Some(user("a")))
        );
        assert_eq!(gate.admit(&IdentityEvent::signed_in(user("a"))), None);
        assert_eq!(gate.admit(&IdentityEvent::signed_out()), Some(None));
        assert_eq!(gate.admit(&IdentityEvent::signed_out()), None);
        assert_eq!(
            gate.admit(&IdentityEvent::signed_in(user("b"))),
            Some(Some(user("b")))
        );
    }

    #[test]
    fn late_not_ready_emissions_ignored() {
        let mut gate = ReadinessGate::new();
        gate.admit(&IdentityEvent::signed_in(user("a")));
        assert_eq!(gate.admit(&IdentityEvent::pending()), None);
    }

    #[test]
    fn transitions() {
        let a = user("a");
        let b = user("b");
        let anon = IdentityState::Unauthenticated;
        let as_a = IdentityState::Authenticated(a.clone());

        assert_eq!(anon.transition_to(None), Transition::None);
        assert_eq!(anon.transition_to(Some(&a)), Transition::Login(a.clone()));
        assert_eq!(as_a.transition_to(Some(&a)), Transition::None);
        assert_eq!(as_a.transition_to(None), Transition::Logout(a.clone()));
        assert_eq!(
            as_a.transition_to(Some(&b)),
            Transition::Switch { from: a, to: b }
        );
    }
}
