// SPDX-License-Identifier: Apache-2.0

//! Multiple-producer, single-consumer channel implementation optimized for single-threaded async.

use crate::error::{RecvError, SendError};
use std::cell::RefCell;
use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::rc::Rc;
use std::task::{Context, Poll, Waker};

struct ChannelState<T> {
    buffer: VecDeque<T>,
    capacity: usize,
    is_closed: bool,
    senders: usize,
    has_receiver: bool,
    receiver_waker: Option<Waker>,
    sender_wakers: VecDeque<Waker>,
}

/// A single-threaded MPSC channel.
pub struct Channel<T> {
    state: RefCell<ChannelState<T>>,
}

impl<T> Channel<T> {
    /// Creates a new channel with the given capacity.
    #[allow(clippy::new_ret_no_self)]
    #[must_use]
    pub fn new(capacity: usize) -> (Sender<T>, Receiver<T>) {
        let channel = Rc::new(Channel {
            state: RefCell::new(ChannelState {
                buffer: VecDeque::with_capacity(capacity),
                capacity,
                is_closed: false,
                senders: 1,
                has_receiver: true,
                receiver_waker: None,
                sender_wakers: VecDeque::new(),
            }),
        });

        (
            Sender {
                channel: channel.clone(),
            },
            Receiver { channel },
        )
    }
}

/// A sender for the channel.
pub struct Sender<T> {
    channel: Rc<Channel<T>>,
}

/// A receiver for the channel.
pub struct Receiver<T> {
    channel: Rc<Channel<T>>,
}

impl<T> Clone for Sender<T> {
    fn clone(&self) -> Self {
        {
            let mut state = self.channel.state.borrow_mut();
            state.senders += 1;
        }
        Sender {
            channel: self.channel.clone(),
        }
    }
}

impl<T> Drop for Sender<T> {
    fn drop(&mut self) {
        let mut state = self.channel.state.borrow_mut();
        state.senders -= 1;

        if state.senders == 0 {
            state.is_closed = true;
            if let Some(waker) = state.receiver_waker.take() {
                waker.wake();
            }
        }
    }
}

impl<T> Drop for Receiver<T> {
    fn drop(&mut self) {
        let mut state = self.channel.state.borrow_mut();
        state.has_receiver = false;
        state.is_closed = true;
        // Wake all senders to handle the closure
        for waker in state.sender_wakers.drain(..) {
            waker.wake();
        }
    }
}

impl<T> Sender<T> {
    /// Sends a value to the channel.
    pub fn send(&self, value: T) -> Result<(), SendError<T>> {
        let mut state = self.channel.state.borrow_mut();

        if state.is_closed || !state.has_receiver {
            return Err(SendError::Closed(value));
        }

        if state.buffer.len() >= state.capacity {
            return Err(SendError::Full(value));
        }

        state.buffer.push_back(value);

        if let Some(waker) = state.receiver_waker.take() {
            waker.wake();
        }

        Ok(())
    }

    /// Sends a value to the channel asynchronously.
    pub async fn send_async(&self, value: T) -> Result<(), SendError<T>> {
        SendFuture {
            sender: self.clone(),
            value: Some(value),
        }
        .await
    }

    /// Closes the channel.
    pub fn close(&self) {
        let mut state = self.channel.state.borrow_mut();
        state.is_closed = true;
        // Wake the receiver if it's waiting
        if let Some(waker) = state.receiver_waker.take() {
            waker.wake();
        }
        // Wake all waiting senders
        for waker in state.sender_wakers.drain(..) {
            waker.wake();
        }
    }
}

impl<T> Receiver<T> {
    /// Tries to receive a value from the channel.
    pub fn try_recv(&self) -> Result<T, RecvError> {
        let mut state = self.channel.state.borrow_mut();

        if let Some(value) = state.buffer.pop_front() {
            // Wake one sender if channel was full
            if state.buffer.len() == state.capacity - 1 {
                if let Some(waker) = state.sender_wakers.pop_front() {
                    waker.wake();
                }
            }
            Ok(value)
        } else if state.is_closed {
            Err(RecvError::Closed)
        } else {
            Err(RecvError::Empty)
        }
    }

    /// Receives a value from the channel asynchronously.
    pub async fn recv(&self) -> Result<T, RecvError> {
        RecvFuture { receiver: self }.await
    }
}

struct SendFuture<T> {
    sender: Sender<T>,
    value: Option<T>,
}

impl<T> Unpin for SendFuture<T> {}

impl<T> Future for SendFuture<T> {
    type Output = Result<(), SendError<T>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        let value = self
            .value
            .take()
            .expect("SendFuture polled after completion");

        match self.sender.send(value) {
            Ok(()) => Poll::Ready(Ok(())),
            Err(SendError::Full(value)) => {
                self.value = Some(value);
                let mut state = self.sender.channel.state.borrow_mut();
                state.sender_wakers.push_back(cx.waker().clone());
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}

struct RecvFuture<'a, T> {
    receiver: &'a Receiver<T>,
}

impl<T> Future for RecvFuture<'_, T> {
    type Output = Result<T, RecvError>;

    fn poll(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Result<T, RecvError>> {
        match self.receiver.try_recv() {
            Ok(value) => Poll::Ready(Ok(value)),
            Err(RecvError::Empty) => {
                let mut state = self.receiver.channel.state.borrow_mut();
                state.receiver_waker = Some(cx.waker().clone());
                Poll::Pending
            }
            Err(e) => Poll::Ready(Err(e)),
        }
    }
}
