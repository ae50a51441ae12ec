/// Type-state markers for the client builder
///
/// A client cannot be built until both a connection config and a channel
/// have been supplied; the compiler enforces it.

use std::marker::PhantomData;

/// Marker trait for config state
pub trait ConfigState {}

/// Connection config has not been set
pub struct NoConfig;
impl ConfigState for NoConfig {}

/// Connection config has been set
pub struct HasConfig;
impl ConfigState for HasConfig {}

/// Marker trait for channel state
pub trait ChannelState {}

/// Channel has not been set
pub struct NoChannel;
impl ChannelState for NoChannel {}

/// Channel has been set
pub struct HasChannel;
impl ChannelState for HasChannel {}

#[derive(Debug, Clone, Copy)]
pub struct TypeState<C, Ch> {
    _config: PhantomData<C>,
    _channel: PhantomData<Ch>,
}

impl<C, Ch> TypeState<C, Ch> {
    pub(crate) fn new() -> Self {
        Self {
            _config: PhantomData,
            _channel: PhantomData,
        }
    }
}
