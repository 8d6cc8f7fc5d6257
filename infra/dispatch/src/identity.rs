//! Identity of unregister targets.
//!
//! A stored handler is "the same" as a target when both refer to the same
//! shared allocation, or when both are senders of the same channel. Sequences
//! flatten into one probe per element.

use crate::handler::EventHandler;
use std::any::Any;
use std::sync::Arc;
use tokio::sync::mpsc;

/// One identity to look for among the registered handlers.
#[derive(Debug, Clone, Copy)]
pub enum Probe<'a> {
    /// Address of a shared allocation (`Arc`).
    Address(usize),
    /// A channel sender, compared with `same_channel`.
    Channel(&'a (dyn Any + Send + Sync)),
}

pub(crate) fn address_of<T: ?Sized>(arc: &Arc<T>) -> usize {
    Arc::as_ptr(arc).cast::<()>().addr()
}

/// A value that can be used as an unregister target.
///
/// Values that cannot be matched against anything registered simply produce
/// no probes.
pub trait Identify {
    /// Appends one probe per handler this value stands for, in order.
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>);
}

impl<T: ?Sized> Identify for Arc<T> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        out.push(Probe::Address(address_of(self)));
    }
}

impl<T: Send + 'static> Identify for mpsc::Sender<T> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        out.push(Probe::Channel(self));
    }
}

impl<T: Send + 'static> Identify for mpsc::UnboundedSender<T> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        out.push(Probe::Channel(self));
    }
}

impl<H: Identify> Identify for [H] {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        for item in self {
            item.probes(out);
        }
    }
}

impl<H: Identify, const N: usize> Identify for [H; N] {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        self.as_slice().probes(out);
    }
}

impl<H: Identify> Identify for Vec<H> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        self.as_slice().probes(out);
    }
}

impl<H: Identify> Identify for Option<H> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        if let Some(inner) = self {
            inner.probes(out);
        }
    }
}

impl<T: Identify + ?Sized> Identify for &T {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        (**self).probes(out);
    }
}

impl Identify for Box<dyn Any + Send + Sync> {
    fn probes<'a>(&'a self, out: &mut Vec<Probe<'a>>) {
        let value: &(dyn Any + Send + Sync) = &**self;
        if let Some(handler) = value.downcast_ref::<Arc<dyn EventHandler>>() {
            handler.probes(out);
        } else if let Some(callable) = value.downcast_ref::<Arc<dyn Fn() + Send + Sync>>() {
            callable.probes(out);
        } else if let Some(items) = value.downcast_ref::<Vec<Box<dyn Any + Send + Sync>>>() {
            items.probes(out);
        }
    }
}

/// Collects the probes for `target`, in order.
pub(crate) fn probes_of<H: Identify + ?Sized>(target: &H) -> Vec<Probe<'_>> {
    let mut out = Vec::new();
    target.probes(&mut out);
    out
}
