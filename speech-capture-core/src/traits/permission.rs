/// Microphone capability check.
pub trait PermissionSource: Send + Sync {
    fn has_record_permission(&self) -> bool;
}

impl<F> PermissionSource for F
where
    F: Fn() -> bool + Send + Sync,
{
    fn has_record_permission(&self) -> bool {
        self()
    }
}
