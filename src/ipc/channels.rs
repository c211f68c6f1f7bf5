use crossbeam::channel::{bounded, Receiver, Sender, TryRecvError, TrySendError};
use std::time::Duration;

use crate::plant::ModelParams;

/// Requests the interface thread forwards to the control thread. They touch
/// the physical model, which only the control thread owns.
#[derive(Clone, Debug, PartialEq)]
pub enum ModelCommand {
    TogglePause,
    /// Re-initialise the model and clear the controller history with it.
    Reset,
    SetParams(ModelParams),
}

#[derive(Clone)]
pub struct CommandChannel {
    // Interface -> Control
    pub command_tx: Sender<ModelCommand>,
    pub command_rx: Receiver<ModelCommand>,
}

impl CommandChannel {
    pub fn new(buffer_size: usize) -> Self {
        let (command_tx, command_rx) = bounded(buffer_size.max(1));
        Self {
            command_tx,
            command_rx,
        }
    }

    /// Never blocks. A full buffer hands the command back to the caller.
    pub fn submit(&self, command: ModelCommand) -> Result<(), TrySendError<ModelCommand>> {
        self.command_tx.try_send(command)
    }

    pub fn try_next(&self) -> Option<ModelCommand> {
        match self.command_rx.try_recv() {
            Ok(command) => Some(command),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        }
    }

    /// Waits up to `timeout` for a command; used while the loop is paused.
    pub fn next_timeout(&self, timeout: Duration) -> Option<ModelCommand> {
        self.command_rx.recv_timeout(timeout).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commands_arrive_in_order() {
        let channel = CommandChannel::new(4);
        channel.submit(ModelCommand::TogglePause).unwrap();
        channel.submit(ModelCommand::Reset).unwrap();

        assert_eq!(channel.try_next(), Some(ModelCommand::TogglePause));
        assert_eq!(channel.try_next(), Some(ModelCommand::Reset));
        assert_eq!(channel.try_next(), None);
    }

    #[test]
    fn full_buffer_rejects_without_blocking() {
        let channel = CommandChannel::new(1);
        channel.submit(ModelCommand::Reset).unwrap();
        let err = channel.submit(ModelCommand::TogglePause).unwrap_err();
        assert!(err.is_full());
        assert_eq!(err.into_inner(), ModelCommand::TogglePause);
    }

    #[test]
    fn next_timeout_returns_none_when_idle() {
        let channel = CommandChannel::new(1);
        assert_eq!(channel.next_timeout(Duration::from_millis(5)), None);
    }
}
