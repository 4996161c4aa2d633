/// Outcome of offering a key to a component.
///
/// Views try components first and only act on the key themselves on `NotHandled`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyResult<T> {
  /// Taken, nothing for the view to do
  Handled,
  /// Taken, with an outcome for the view
  Event(T),
  /// Not taken; try the next handler
  NotHandled,
}
