use std::thread::{self, ThreadId};

/// Checks that calls arrive on the context that created the owner.
///
/// The piggyback state is not locked. It belongs to a single network
/// context, and calling in from anywhere else is a bug in the caller.
#[derive(Debug, Clone)]
pub(crate) struct SequenceChecker {
    owner: ThreadId,
}

impl SequenceChecker {
    pub fn new() -> Self {
        SequenceChecker {
            owner: thread::current().id(),
        }
    }

    /// Panics when called from a different thread than the creating one.
    #[track_caller]
    pub fn check(&self) {
        let current = thread::current().id();
        assert_eq!(
            current, self.owner,
            "piggyback state used off its owning context"
        );
    }
}
