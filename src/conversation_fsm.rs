use rust_fsm::*;

state_machine! {
    conversation_flow(Idle)

    Idle(HydrateAwaitingTime) => AwaitingTime,
    Idle(HydrateAwaitingText) => AwaitingText,

    Idle(BeginSchedule) => AwaitingTime,
    Idle(TimeAccepted) => AwaitingText,
    Idle(Cancel) => Idle,

    AwaitingTime(BeginSchedule) => AwaitingTime,
    AwaitingTime(TimeRejected) => AwaitingTime,
    AwaitingTime(TimeAccepted) => AwaitingText,
    AwaitingTime(Cancel) => Idle,

    AwaitingText(BeginSchedule) => AwaitingTime,
    AwaitingText(TimeAccepted) => AwaitingText,
    AwaitingText(TextReceived) => Idle,
    AwaitingText(Cancel) => Idle
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum ConversationStep {
    #[default]
    Idle,
    AwaitingTime,
    AwaitingText,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ConversationEvent {
    /// `/remind` without a time.
    BeginSchedule,
    TimeAccepted,
    TimeRejected,
    /// Reminder text arrived, whether or not it was stored.
    TextReceived,
    Cancel,
}

fn hydrate(
    machine: &mut conversation_flow::StateMachine,
    step: ConversationStep,
) -> Result<(), ()> {
    let input = match step {
        ConversationStep::Idle => return Ok(()),
        ConversationStep::AwaitingTime => conversation_flow::Input::HydrateAwaitingTime,
        ConversationStep::AwaitingText => conversation_flow::Input::HydrateAwaitingText,
    };
    machine.consume(&input).map_err(|_| ())?;
    Ok(())
}

fn expected_next_step(
    current: ConversationStep,
    event: ConversationEvent,
) -> Option<ConversationStep> {
    use ConversationEvent as E;
    use ConversationStep as S;
    match (current, event) {
        (_, E::Cancel) => Some(S::Idle),
        (S::Idle | S::AwaitingTime | S::AwaitingText, E::BeginSchedule) => Some(S::AwaitingTime),
        (S::AwaitingTime, E::TimeRejected) => Some(S::AwaitingTime),
        (S::Idle | S::AwaitingTime | S::AwaitingText, E::TimeAccepted) => Some(S::AwaitingText),
        (S::AwaitingText, E::TextReceived) => Some(S::Idle),
        _ => None,
    }
}

/// Next step, or `None` when `event` makes no sense in `current`.
pub fn transition(current: ConversationStep, event: ConversationEvent) -> Option<ConversationStep> {
    let mut machine = conversation_flow::StateMachine::new();
    hydrate(&mut machine, current).ok()?;

    let input = match event {
        ConversationEvent::BeginSchedule => conversation_flow::Input::BeginSchedule,
        ConversationEvent::TimeAccepted => conversation_flow::Input::TimeAccepted,
        ConversationEvent::TimeRejected => conversation_flow::Input::TimeRejected,
        ConversationEvent::TextReceived => conversation_flow::Input::TextReceived,
        ConversationEvent::Cancel => conversation_flow::Input::Cancel,
    };
    machine.consume(&input).ok()?;
    expected_next_step(current, event)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn schedule_flow_walks_through_both_steps() {
        let step = transition(ConversationStep::Idle, ConversationEvent::BeginSchedule);
        assert_eq!(step, Some(ConversationStep::AwaitingTime));

        let step = transition(ConversationStep::AwaitingTime, ConversationEvent::TimeRejected);
        assert_eq!(step, Some(ConversationStep::AwaitingTime));

        let step = transition(ConversationStep::AwaitingTime, ConversationEvent::TimeAccepted);
        assert_eq!(step, Some(ConversationStep::AwaitingText));

        let step = transition(ConversationStep::AwaitingText, ConversationEvent::TextReceived);
        assert_eq!(step, Some(ConversationStep::Idle));
    }

    #[test]
    fn inline_time_skips_the_time_prompt() {
        assert_eq!(
            transition(ConversationStep::Idle, ConversationEvent::TimeAccepted),
            Some(ConversationStep::AwaitingText)
        );
    }

    #[test]
    fn cancel_returns_to_idle_from_anywhere() {
        for step in [
            ConversationStep::Idle,
            ConversationStep::AwaitingTime,
            ConversationStep::AwaitingText,
        ] {
            assert_eq!(
                transition(step, ConversationEvent::Cancel),
                Some(ConversationStep::Idle)
            );
        }
    }

    #[test]
    fn rejects_events_out_of_order() {
        assert_eq!(
            transition(ConversationStep::Idle, ConversationEvent::TextReceived),
            None
        );
        assert_eq!(
            transition(ConversationStep::AwaitingTime, ConversationEvent::TextReceived),
            None
        );
        assert_eq!(
            transition(ConversationStep::AwaitingText, ConversationEvent::TimeRejected),
            None
        );
    }
}
