use crate::error::Error;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A cloneable cancellation flag for long-running passes over the tree.
///
/// Passes check the flag once per node and return `Error::Aborted` without committing any of
/// their work if it has been raised.
#[derive(Clone, Default, Debug)]
pub struct AbortSignal(Arc<AtomicBool>);

impl AbortSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn abort(&self) {
        self.0.store(true, Ordering::Relaxed)
    }

    pub fn is_aborted(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

pub(crate) fn check_abort(signal: Option<&AbortSignal>) -> Result<(), Error> {
    if signal.map_or(false, AbortSignal::is_aborted) {
        Err(Error::Aborted)
    } else {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn clones_share_the_flag() {
        let signal = AbortSignal::new();
        let clone = signal.clone();

        assert_eq!(check_abort(Some(&signal)), Ok(()));
        clone.abort();
        assert!(signal.is_aborted());
        assert_eq!(check_abort(Some(&signal)), Err(Error::Aborted));
        assert_eq!(check_abort(None), Ok(()));
    }
}
