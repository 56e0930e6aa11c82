//! Cuerpo de respuesta que avisa al terminar de enviarse
//!
//! Hyper sigue pidiendo frames hasta recibir el fin del stream, así que el
//! aviso se dispara cuando el payload ya se entregó al transporte.

use std::convert::Infallible;
use std::pin::Pin;
use std::task::{Context, Poll};

use axum::body::{Body, Bytes};
use futures::Stream;
use tokio::sync::oneshot;

pub struct NotifyOnComplete {
    chunk: Option<Bytes>,
    done: Option<oneshot::Sender<()>>,
}

impl NotifyOnComplete {
    pub fn new(payload: impl Into<Bytes>, done: oneshot::Sender<()>) -> Self {
        Self {
            chunk: Some(payload.into()),
            done: Some(done),
        }
    }

    pub fn into_body(self) -> Body {
        Body::from_stream(self)
    }
}

impl Stream for NotifyOnComplete {
    type Item = Result<Bytes, Infallible>;

    fn poll_next(mut self: Pin<&mut Self>, _cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        if let Some(chunk) = self.chunk.take() {
            return Poll::Ready(Some(Ok(chunk)));
        }
        if let Some(done) = self.done.take() {
            let _ = done.send(());
        }
        Poll::Ready(None)
    }
}
