//! Input emission adapters

use tracing::trace;

use crate::bot::driver::InputSink;
use crate::net::inbox::InboxSender;
use crate::net::protocol::{encode_frame, encode_json, ClientMessage, InputRecord, UplinkFrame, WireId};

/// Input could not be handed to the transport
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SinkError {
    #[error("transport queue is full")]
    Full,
    #[error("transport disconnected")]
    Disconnected,
    #[error("encode failed: {0}")]
    Encode(String),
}

/// Binary uplink: bincode frames tagged with the sender id
pub struct FrameSink {
    player_id: WireId,
    tx: InboxSender<Vec<u8>>,
}

impl FrameSink {
    pub fn new(player_id: WireId, tx: InboxSender<Vec<u8>>) -> Self {
        Self { player_id, tx }
    }
}

impl InputSink for FrameSink {
    fn send(&mut self, record: &InputRecord) -> Result<(), SinkError> {
        let frame = UplinkFrame {
            player_id: self.player_id,
            record: *record,
        };
        let bytes = encode_frame(&frame).map_err(|e| SinkError::Encode(e.to_string()))?;
        trace!(len = bytes.len(), tick = record.tick, "Input frame queued");
        self.tx.try_send(bytes)
    }
}

/// Text uplink: `{"type":"input",...}` JSON
pub struct JsonSink {
    tx: InboxSender<String>,
}

impl JsonSink {
    pub fn new(tx: InboxSender<String>) -> Self {
        Self { tx }
    }
}

impl InputSink for JsonSink {
    fn send(&mut self, record: &InputRecord) -> Result<(), SinkError> {
        let text = encode_json(&ClientMessage::Input(*record))
            .map_err(|e| SinkError::Encode(e.to_string()))?;
        self.tx.try_send(text)
    }
}

/// Keeps every record in memory; for hosts that poll, and for tests
#[derive(Debug, Default)]
pub struct VecSink {
    records: Vec<InputRecord>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn records(&self) -> &[InputRecord] {
        &self.records
    }

    pub fn take(&mut self) -> Vec<InputRecord> {
        std::mem::take(&mut self.records)
    }
}

impl InputSink for VecSink {
    fn send(&mut self, record: &InputRecord) -> Result<(), SinkError> {
        self.records.push(*record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::game::systems::predictor::MoveAxes;
    use crate::net::inbox::Inbox;
    use crate::net::protocol::{decode_client_json, decode_frame};

    fn record(tick: u32) -> InputRecord {
        InputRecord::new(tick, MoveAxes { x: 10, y: -20 }, false, 5)
    }

    #[test]
    fn test_frame_sink_tags_sender() {
        let inbox = Inbox::new(4);
        let mut sink = FrameSink::new([3; 16], inbox.sender());
        sink.send(&record(7)).unwrap();
        let frames = inbox.drain();
        let frame: UplinkFrame = decode_frame(&frames[0]).unwrap();
        assert_eq!(frame.player_id, [3; 16]);
        assert_eq!(frame.record.tick, 7);
    }

    #[test]
    fn test_frame_sink_reports_full_queue() {
        let inbox = Inbox::new(1);
        let mut sink = FrameSink::new([0; 16], inbox.sender());
        sink.send(&record(1)).unwrap();
        assert_eq!(sink.send(&record(2)), Err(SinkError::Full));
    }

    #[test]
    fn test_json_sink() {
        let inbox = Inbox::new(4);
        let mut sink = JsonSink::new(inbox.sender());
        sink.send(&record(3)).unwrap();
        let text = inbox.drain().remove(0);
        assert_eq!(decode_client_json(&text).unwrap(), ClientMessage::Input(record(3)));
    }

    #[test]
    fn test_vec_sink_take() {
        let mut sink = VecSink::new();
        sink.send(&record(1)).unwrap();
        sink.send(&record(2)).unwrap();
        assert_eq!(sink.records().len(), 2);
        assert_eq!(sink.take().len(), 2);
        assert!(sink.records().is_empty());
    }
}
