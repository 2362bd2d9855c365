/// A state machine driven by one input at a time.
///
/// Transitions consume the current state and return the next one, so a
/// state that has been left cannot be observed again by mistake.
pub trait FiniteStateMachine {
    type Input;

    #[must_use]
    fn transition(self, input: Self::Input) -> Self;
}
