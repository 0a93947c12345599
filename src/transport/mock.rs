//! Mock serial port implementation for testing
//!
//! This module provides a mock serial port that can be used to test
//! the RTU client without requiring actual hardware. Incoming bytes are
//! either queued up front or produced by a responder that sees each
//! written request.

use std::collections::VecDeque;
use std::io;
use std::pin::Pin;
use std::sync::{Arc, Mutex, MutexGuard};
use std::task::{Context, Poll};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, ReadBuf};

use crate::error::SunSpecError;
use crate::transport::ByteStream;

/// Produces the bytes a device would answer to one written request.
pub type Responder = Box<dyn FnMut(&[u8]) -> Vec<u8> + Send>;

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Mock serial port that simulates bidirectional communication
#[derive(Clone, Default)]
pub struct MockSerialPort {
    /// Every write, one entry per call
    pub tx_frames: Arc<Mutex<Vec<Vec<u8>>>>,
    /// Data to be read from the port (incoming)
    pub rx_buffer: Arc<Mutex<VecDeque<u8>>>,
    /// Simulated error for the next read or write
    pub next_error: Arc<Mutex<Option<io::Error>>>,
    /// Simulated error for the next flush
    pub flush_error: Arc<Mutex<Option<io::Error>>>,
    responder: Arc<Mutex<Option<Responder>>>,
}

impl MockSerialPort {
    pub fn new() -> Self {
        Self::default()
    }

    /// A port whose incoming bytes are computed from each written request.
    pub fn with_responder<F>(responder: F) -> Self
    where
        F: FnMut(&[u8]) -> Vec<u8> + Send + 'static,
    {
        let port = Self::new();
        *lock(&port.responder) = Some(Box::new(responder));
        port
    }

    /// Queue data to be read from the port
    pub fn queue_rx_data(&self, data: &[u8]) {
        lock(&self.rx_buffer).extend(data);
    }

    /// All bytes written so far
    pub fn get_tx_data(&self) -> Vec<u8> {
        lock(&self.tx_frames).concat()
    }

    /// Writes so far, one frame per call
    pub fn tx_frames(&self) -> Vec<Vec<u8>> {
        lock(&self.tx_frames).clone()
    }

    pub fn pending_rx(&self) -> usize {
        lock(&self.rx_buffer).len()
    }

    /// Clear all buffers
    pub fn clear(&self) {
        lock(&self.tx_frames).clear();
        lock(&self.rx_buffer).clear();
    }

    /// Set an error to be returned on the next read or write
    pub fn set_next_error(&self, error: io::Error) {
        *lock(&self.next_error) = Some(error);
    }

    /// Set an error to be returned on the next flush
    pub fn set_flush_error(&self, error: io::Error) {
        *lock(&self.flush_error) = Some(error);
    }

    fn take_error(&self) -> Option<io::Error> {
        lock(&self.next_error).take()
    }
}

// Implement AsyncRead for MockSerialPort
impl AsyncRead for MockSerialPort {
    fn poll_read(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        if let Some(error) = self.take_error() {
            return Poll::Ready(Err(error));
        }

        // An empty queue reads as end of stream, which the RTU client treats as a timeout.
        let mut rx = lock(&self.rx_buffer);
        let available = rx.len().min(buf.remaining());
        if available > 0 {
            let data: Vec<u8> = rx.drain(..available).collect();
            buf.put_slice(&data);
        }

        Poll::Ready(Ok(()))
    }
}

// Implement AsyncWrite for MockSerialPort
impl AsyncWrite for MockSerialPort {
    fn poll_write(
        self: Pin<&mut Self>,
        _cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        if let Some(error) = self.take_error() {
            return Poll::Ready(Err(error));
        }

        lock(&self.tx_frames).push(buf.to_vec());
        if let Some(responder) = lock(&self.responder).as_mut() {
            let reply = responder(buf);
            lock(&self.rx_buffer).extend(reply);
        }
        Poll::Ready(Ok(buf.len()))
    }

    fn poll_flush(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }

    fn poll_shutdown(self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        Poll::Ready(Ok(()))
    }
}

#[async_trait]
impl ByteStream for MockSerialPort {
    async fn read(&mut self, buf: &mut [u8], _timeout: Duration) -> Result<usize, SunSpecError> {
        Ok(AsyncReadExt::read(self, buf).await?)
    }

    async fn write(&mut self, data: &[u8], _timeout: Duration) -> Result<(), SunSpecError> {
        AsyncWriteExt::write_all(self, data).await?;
        Ok(())
    }

    async fn flush(&mut self, _tx: bool, rx: bool) -> Result<(), SunSpecError> {
        if let Some(error) = lock(&self.flush_error).take() {
            return Err(error.into());
        }
        if rx {
            lock(&self.rx_buffer).clear();
        }
        Ok(())
    }
}
