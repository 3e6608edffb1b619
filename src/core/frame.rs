use bytes::Bytes;

/// Transport-neutral websocket frame type.
///
/// Transports convert their native frame representation into/from `WsFrame`; the session
/// only ever produces text frames carrying JSON.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum WsFrame {
    Text(Bytes),
    Binary(Bytes),
    Ping(Bytes),
    Pong(Bytes),
    Close(Option<WsCloseFrame>),
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct WsCloseFrame {
    pub code: u16,
    pub reason: Bytes,
}

impl WsFrame {
    /// Text frame from an already-encoded JSON document.
    #[inline]
    pub fn json(encoded: String) -> Self {
        Self::Text(Bytes::from(encoded))
    }

    /// Normal closure (1000) sent on an explicit disconnect.
    #[inline]
    pub fn normal_close(reason: &'static str) -> Self {
        Self::Close(Some(WsCloseFrame {
            code: 1000,
            reason: Bytes::from_static(reason.as_bytes()),
        }))
    }

    /// Payload of data frames; control frames yield `None`.
    #[inline]
    pub fn payload(&self) -> Option<&[u8]> {
        match self {
            WsFrame::Text(bytes) | WsFrame::Binary(bytes) => Some(bytes.as_ref()),
            WsFrame::Ping(_) | WsFrame::Pong(_) | WsFrame::Close(_) => None,
        }
    }
}
