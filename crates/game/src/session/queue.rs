use crossbeam_channel::{Receiver, Sender, TryRecvError, unbounded};

use super::instruction::Instruction;
use crate::net::{ClientMessage, ClientOpcode};

/// An application-originated message awaiting transmission.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    message: ClientMessage,
}

impl OutboundMessage {
    pub fn new(message: ClientMessage) -> Self {
        Self { message }
    }

    pub fn opcode(&self) -> ClientOpcode {
        self.message.opcode()
    }

    pub fn message(&self) -> &ClientMessage {
        &self.message
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ControlCommand {
    CancelConnection,
}

/// Non-blocking FIFO usable from any number of producer threads.
#[derive(Debug)]
pub struct WorkQueue<T> {
    sender: Sender<T>,
    receiver: Receiver<T>,
}

impl<T> Clone for WorkQueue<T> {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
            receiver: self.receiver.clone(),
        }
    }
}

impl<T> Default for WorkQueue<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> WorkQueue<T> {
    pub fn new() -> Self {
        let (sender, receiver) = unbounded();
        Self { sender, receiver }
    }

    pub fn push(&self, item: T) {
        // Both ends live in `self`, so the channel cannot be disconnected.
        let _ = self.sender.send(item);
    }

    pub fn try_pop(&self) -> Option<T> {
        match self.receiver.try_recv() {
            Ok(item) => Some(item),
            Err(TryRecvError::Empty | TryRecvError::Disconnected) => None,
        }
    }

    /// Everything queued at the moment of the call, oldest first.
    pub fn drain(&self) -> Vec<T> {
        let queued = self.receiver.len();
        self.receiver.try_iter().take(queued).collect()
    }

    pub fn clear(&self) -> usize {
        self.receiver.try_iter().count()
    }

    pub fn len(&self) -> usize {
        self.receiver.len()
    }

    pub fn is_empty(&self) -> bool {
        self.receiver.is_empty()
    }
}

/// The three queues connecting the application and network threads.
#[derive(Debug, Clone, Default)]
pub struct SessionQueues {
    pub outbound: WorkQueue<OutboundMessage>,
    pub control: WorkQueue<ControlCommand>,
    pub application: WorkQueue<Instruction>,
}

impl SessionQueues {
    pub fn new() -> Self {
        Self::default()
    }

    /// Discards anything left over from a previous session.
    pub fn clear_all(&self) {
        let stale =
            self.outbound.clear() + self.control.clear() + self.application.clear();
        if stale > 0 {
            log::debug!("Discarded {} stale queue entries", stale);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_fifo_order() {
        let queue = WorkQueue::new();
        for i in 0..5 {
            queue.push(i);
        }

        assert_eq!(queue.try_pop(), Some(0));
        assert_eq!(queue.drain(), vec![1, 2, 3, 4]);
        assert_eq!(queue.try_pop(), None);
    }

    #[test]
    fn test_per_producer_order_across_threads() {
        let queue = WorkQueue::new();

        let producers: Vec<_> = (0..4u32)
            .map(|producer| {
                let queue = queue.clone();
                thread::spawn(move || {
                    for i in 0..100u32 {
                        queue.push((producer, i));
                    }
                })
            })
            .collect();
        for producer in producers {
            producer.join().unwrap();
        }

        let items = queue.drain();
        assert_eq!(items.len(), 400);
        for producer in 0..4 {
            let seen: Vec<u32> = items
                .iter()
                .filter(|(p, _)| *p == producer)
                .map(|(_, i)| *i)
                .collect();
            assert_eq!(seen, (0..100).collect::<Vec<_>>());
        }
    }

    #[test]
    fn test_clear_all() {
        let queues = SessionQueues::new();
        queues.outbound.push(OutboundMessage::new(ClientMessage::Disconnect));
        queues.control.push(ControlCommand::CancelConnection);
        queues.application.push(Instruction::LoginSuccess);

        queues.clear_all();

        assert!(queues.outbound.is_empty());
        assert!(queues.control.is_empty());
        assert!(queues.application.is_empty());
    }
}
