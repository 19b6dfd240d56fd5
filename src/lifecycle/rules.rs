use crate::db::TaskStatus;

/// Task status transition table.
///
/// Always `true`: any status may follow any other, including itself, so a repeated request is a
/// no-op rather than an error. Who may request a transition is decided by the access layer.
pub fn can_transition(from: TaskStatus, to: TaskStatus) -> bool {
    use TaskStatus::*;

    matches!((from, to), (Todo | InProgress | Done, Todo | InProgress | Done))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_same_state_always_allowed() {
        for status in TaskStatus::ALL {
            assert!(can_transition(status, status));
        }
    }

    #[test]
    fn test_all_transitions_allowed() {
        for from in TaskStatus::ALL {
            for to in TaskStatus::ALL {
                assert!(can_transition(from, to), "Expected {:?} -> {:?} to be allowed", from, to);
            }
        }
    }
}
