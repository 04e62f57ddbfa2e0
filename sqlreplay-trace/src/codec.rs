// Copyright 2025 Sqlreplay Contributors
//
// This program is free software: you can redistribute it and/or modify
// it under the terms of the GNU Affero General Public License as published by
// the Free Software Foundation, either version 3 of the License, or
// (at your option) any later version.
//
// This program is distributed in the hope that it will be useful,
// but WITHOUT ANY WARRANTY; without even the implied warranty of
// MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
// GNU Affero General Public License for more details.
//
// You should have received a copy of the GNU Affero General Public License
// along with this program. If not, see <https://www.gnu.org/licenses/>.

//! Binary session-trace codec.
//!
//! Little-endian framed format:
//!
//! ```text
//! header:  magic "STRC" | version u16
//! frame:   class u16 | field_count u16 | action_count u16 | entries...
//! entry:   name_len u16 | name utf8 | tag u8 | value
//! value:   tag 0 text: len u32 | utf8 bytes
//!          tag 1 uint: u64
//! ```
//!
//! A source that cannot be opened is `SourceUnavailable`; anything
//! structurally wrong past that point (bad magic, unknown tag, truncation
//! mid-frame) is `TraceFormat`.

use crate::error::TraceError;
use crate::event::{EventClass, TraceEvent, TraceValue};
use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::collections::HashMap;
use std::fs::File;
use std::io::{self, BufReader, BufWriter, ErrorKind, Read, Write};
use std::path::Path;

pub const TRACE_FORMAT_VERSION: u16 = 1;

const TRACE_MAGIC: &[u8; 4] = b"STRC";

const TAG_TEXT: u8 = 0;
const TAG_UINT: u8 = 1;

// Upper bound on a single text value; a longer length prefix means a
// corrupt stream, not a real statement.
const MAX_TEXT_BYTES: u32 = 16 * 1024 * 1024;

fn map_read_err(err: io::Error) -> TraceError {
    if err.kind() == ErrorKind::UnexpectedEof {
        TraceError::format("truncated event frame")
    } else {
        TraceError::SourceUnavailable(err)
    }
}

/// Streaming reader over a trace byte source.
pub struct TraceReader<R: Read> {
    inner: R,
    events_read: u64,
}

impl TraceReader<BufReader<File>> {
    /// Open a trace file. An unreadable path is `SourceUnavailable`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self, TraceError> {
        let file = File::open(path)?;
        Self::new(BufReader::new(file))
    }
}

impl<R: Read> TraceReader<R> {
    /// Wrap a byte source and validate the header.
    pub fn new(mut source: R) -> Result<Self, TraceError> {
        let mut magic = [0u8; 4];
        source.read_exact(&mut magic).map_err(|err| {
            if err.kind() == ErrorKind::UnexpectedEof {
                TraceError::format("truncated trace header")
            } else {
                TraceError::SourceUnavailable(err)
            }
        })?;
        if &magic != TRACE_MAGIC {
            return Err(TraceError::format("bad trace magic"));
        }
        let version = source
            .read_u16::<LittleEndian>()
            .map_err(|_| TraceError::format("truncated trace header"))?;
        if version != TRACE_FORMAT_VERSION {
            return Err(TraceError::format(format!(
                "unsupported trace version {version}"
            )));
        }
        Ok(Self {
            inner: source,
            events_read: 0,
        })
    }

    pub fn events_read(&self) -> u64 {
        self.events_read
    }

    /// Decode the next event frame; `None` at a clean end of stream.
    pub fn read_event(&mut self) -> Result<Option<TraceEvent>, TraceError> {
        let mut first = [0u8; 1];
        loop {
            match self.inner.read(&mut first) {
                Ok(0) => return Ok(None),
                Ok(_) => break,
                Err(err) if err.kind() == ErrorKind::Interrupted => continue,
                Err(err) => return Err(TraceError::SourceUnavailable(err)),
            }
        }
        let second = self.inner.read_u8().map_err(map_read_err)?;
        let class = EventClass::from_code(u16::from_le_bytes([first[0], second]));

        let field_count = self.inner.read_u16::<LittleEndian>().map_err(map_read_err)?;
        let action_count = self.inner.read_u16::<LittleEndian>().map_err(map_read_err)?;

        let fields = self.read_entries(field_count)?;
        let actions = self.read_entries(action_count)?;

        self.events_read += 1;
        Ok(Some(TraceEvent {
            class,
            fields,
            actions,
        }))
    }

    fn read_entries(&mut self, count: u16) -> Result<HashMap<String, TraceValue>, TraceError> {
        let mut entries = HashMap::with_capacity(count as usize);
        for _ in 0..count {
            let name = self.read_name()?;
            let value = self.read_value()?;
            entries.insert(name, value);
        }
        Ok(entries)
    }

    fn read_name(&mut self) -> Result<String, TraceError> {
        let len = self.inner.read_u16::<LittleEndian>().map_err(map_read_err)?;
        let mut buf = vec![0u8; len as usize];
        self.inner.read_exact(&mut buf).map_err(map_read_err)?;
        String::from_utf8(buf).map_err(|_| TraceError::format("entry name is not valid utf-8"))
    }

    fn read_value(&mut self) -> Result<TraceValue, TraceError> {
        match self.inner.read_u8().map_err(map_read_err)? {
            TAG_TEXT => {
                let len = self.inner.read_u32::<LittleEndian>().map_err(map_read_err)?;
                if len > MAX_TEXT_BYTES {
                    return Err(TraceError::format(format!(
                        "text value length {len} exceeds limit"
                    )));
                }
                let mut buf = vec![0u8; len as usize];
                self.inner.read_exact(&mut buf).map_err(map_read_err)?;
                let text = String::from_utf8(buf)
                    .map_err(|_| TraceError::format("text value is not valid utf-8"))?;
                Ok(TraceValue::Text(text))
            }
            TAG_UINT => {
                let value = self.inner.read_u64::<LittleEndian>().map_err(map_read_err)?;
                Ok(TraceValue::UInt(value))
            }
            tag => Err(TraceError::format(format!("unknown value tag {tag}"))),
        }
    }
}

impl<R: Read> Iterator for TraceReader<R> {
    type Item = Result<TraceEvent, TraceError>;

    fn next(&mut self) -> Option<Self::Item> {
        self.read_event().transpose()
    }
}

/// Writes traces in the same framing; used by capture tooling and tests.
pub struct TraceWriter<W: Write> {
    inner: W,
}

impl TraceWriter<BufWriter<File>> {
    pub fn create(path: impl AsRef<Path>) -> io::Result<Self> {
        Self::new(BufWriter::new(File::create(path)?))
    }
}

impl<W: Write> TraceWriter<W> {
    pub fn new(mut sink: W) -> io::Result<Self> {
        sink.write_all(TRACE_MAGIC)?;
        sink.write_u16::<LittleEndian>(TRACE_FORMAT_VERSION)?;
        Ok(Self { inner: sink })
    }

    pub fn write_event(&mut self, event: &TraceEvent) -> io::Result<()> {
        self.inner.write_u16::<LittleEndian>(event.class.code())?;
        self.inner
            .write_u16::<LittleEndian>(event.fields.len() as u16)?;
        self.inner
            .write_u16::<LittleEndian>(event.actions.len() as u16)?;
        for (name, value) in &event.fields {
            self.write_entry(name, value)?;
        }
        for (name, value) in &event.actions {
            self.write_entry(name, value)?;
        }
        Ok(())
    }

    fn write_entry(&mut self, name: &str, value: &TraceValue) -> io::Result<()> {
        self.inner.write_u16::<LittleEndian>(name.len() as u16)?;
        self.inner.write_all(name.as_bytes())?;
        match value {
            TraceValue::Text(text) => {
                self.inner.write_u8(TAG_TEXT)?;
                self.inner.write_u32::<LittleEndian>(text.len() as u32)?;
                self.inner.write_all(text.as_bytes())?;
            }
            TraceValue::UInt(value) => {
                self.inner.write_u8(TAG_UINT)?;
                self.inner.write_u64::<LittleEndian>(*value)?;
            }
        }
        Ok(())
    }

    pub fn finish(mut self) -> io::Result<W> {
        self.inner.flush()?;
        Ok(self.inner)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{BATCH_TEXT_FIELD, SESSION_ID_ACTION};
    use std::io::Cursor;

    fn sample_events() -> Vec<TraceEvent> {
        vec![
            TraceEvent::new(EventClass::BatchCompleted)
                .with_field(BATCH_TEXT_FIELD, TraceValue::Text("SELECT 1".into()))
                .with_action(SESSION_ID_ACTION, TraceValue::UInt(51)),
            TraceEvent::new(EventClass::Other(9)),
            TraceEvent::new(EventClass::RpcCompleted)
                .with_field("object_name", TraceValue::Text("usp_load".into()))
                .with_field("statement", TraceValue::Text("EXEC usp_load 1".into()))
                .with_action(SESSION_ID_ACTION, TraceValue::UInt(52)),
        ]
    }

    fn encode(events: &[TraceEvent]) -> Vec<u8> {
        let mut writer = TraceWriter::new(Vec::new()).unwrap();
        for event in events {
            writer.write_event(event).unwrap();
        }
        writer.finish().unwrap()
    }

    #[test]
    fn written_traces_decode_to_the_same_events() {
        let events = sample_events();
        let bytes = encode(&events);

        let reader = TraceReader::new(Cursor::new(bytes)).unwrap();
        let decoded: Vec<TraceEvent> = reader.map(|e| e.unwrap()).collect();
        assert_eq!(decoded, events);
    }

    #[test]
    fn bad_magic_is_a_format_error() {
        let err = TraceReader::new(Cursor::new(b"NOPE\x01\x00".to_vec())).err().unwrap();
        assert!(matches!(err, TraceError::TraceFormat(_)));
    }

    #[test]
    fn unsupported_version_is_a_format_error() {
        let mut bytes = TRACE_MAGIC.to_vec();
        bytes.extend_from_slice(&99u16.to_le_bytes());
        let err = TraceReader::new(Cursor::new(bytes)).err().unwrap();
        assert!(matches!(err, TraceError::TraceFormat(_)));
    }

    #[test]
    fn truncated_frame_is_a_format_error() {
        let events = sample_events();
        let mut bytes = encode(&events);
        bytes.truncate(bytes.len() - 3);

        let reader = TraceReader::new(Cursor::new(bytes)).unwrap();
        let results: Vec<_> = reader.collect();
        let last = results.last().unwrap();
        assert!(matches!(last, Err(TraceError::TraceFormat(_))));
    }

    #[test]
    fn unknown_tag_is_a_format_error() {
        let mut bytes = TRACE_MAGIC.to_vec();
        bytes.extend_from_slice(&TRACE_FORMAT_VERSION.to_le_bytes());
        // class 1, one field, no actions, name "x", tag 7
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.extend_from_slice(&0u16.to_le_bytes());
        bytes.extend_from_slice(&1u16.to_le_bytes());
        bytes.push(b'x');
        bytes.push(7);

        let mut reader = TraceReader::new(Cursor::new(bytes)).unwrap();
        let err = reader.read_event().unwrap_err();
        assert!(matches!(err, TraceError::TraceFormat(_)));
    }

    #[test]
    fn missing_file_is_source_unavailable() {
        let dir = tempfile::tempdir().unwrap();
        let err = TraceReader::open(dir.path().join("missing.strc")).err().unwrap();
        assert!(matches!(err, TraceError::SourceUnavailable(_)));
    }
}
