use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// A length prefix above this is treated as corruption rather than allocated.
const MAX_RECORD_BYTES: usize = 16 * 1024 * 1024;

/// Encode a single event as `[len][bincode][crc32]`.
fn encode_record(writer: &mut impl Write, event: &Event) -> io::Result<()> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    if payload.len() > MAX_RECORD_BYTES {
        return Err(io::Error::new(io::ErrorKind::InvalidData, "record too large"));
    }
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(())
}

/// Read one record and its encoded size. `Ok(None)` means clean end of log or
/// a torn/corrupt tail.
fn decode_record(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_full(reader, &mut len_buf)? {
        return Ok(None);
    }
    let len = u32::from_le_bytes(len_buf) as usize;
    if len > MAX_RECORD_BYTES {
        return Ok(None);
    }

    let mut payload = vec![0u8; len];
    if !read_full(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_full(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let size = (len + 8) as u64;
    Ok(bincode::deserialize::<Event>(&payload).ok().map(|event| (event, size)))
}

/// `read_exact` that reports EOF as `false` instead of an error.
fn read_full(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Append-only write-ahead log holding every calendar and ledger mutation.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`, little endian.
/// A torn last entry (crash mid-write) fails its length or CRC check and is
/// dropped on replay, along with anything after it. `recover` cuts those bytes
/// off so later appends land right after the last intact record.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    appends_since_compact: u64,
    /// File length and append count as of the last successful `flush_sync`.
    durable_len: u64,
    durable_appends: u64,
}

/// Result of scanning a log: every intact record and where they end.
#[derive(Debug)]
pub struct Replay {
    pub events: Vec<Event>,
    pub valid_len: u64,
    pub file_len: u64,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let durable_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            appends_since_compact: 0,
            durable_len,
            durable_appends: 0,
        })
    }

    /// Append one event and fsync. The engine batches through
    /// `append_buffered` + `flush_sync` instead.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    /// Buffer an event without syncing. Durable only after `flush_sync`.
    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        encode_record(&mut self.writer, event)?;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.durable_len = self.writer.get_ref().metadata()?.len();
        self.durable_appends = self.appends_since_compact;
        Ok(())
    }

    /// Throw away everything appended since the last successful `flush_sync`:
    /// buffered bytes are dropped unwritten and the file is cut back to its
    /// durable length.
    pub fn rollback(&mut self) -> io::Result<()> {
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let stale = std::mem::replace(&mut self.writer, BufWriter::new(file));
        // into_parts hands back the buffer instead of flushing it on drop
        drop(stale.into_parts());
        let file = self.writer.get_ref();
        file.set_len(self.durable_len)?;
        file.sync_all()?;
        self.appends_since_compact = self.durable_appends;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Write the compacted event list to `<wal>.tmp` and fsync it.
    pub fn write_compact_file(path: &Path, events: &[Event]) -> io::Result<()> {
        let tmp_path = path.with_extension("wal.tmp");
        let mut writer = BufWriter::new(File::create(&tmp_path)?);
        for event in events {
            encode_record(&mut writer, event)?;
        }
        writer.flush()?;
        writer.get_ref().sync_all()
    }

    /// Rename the temp file over the live log and reopen it for appends.
    pub fn swap_compact_file(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        let tmp_path = self.path.with_extension("wal.tmp");
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        self.durable_len = file.metadata()?.len();
        self.writer = BufWriter::new(file);
        self.appends_since_compact = 0;
        self.durable_appends = 0;
        Ok(())
    }

    #[cfg(test)]
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        Self::write_compact_file(&self.path, events)?;
        self.swap_compact_file()
    }

    /// Read every intact record. A missing file is an empty log.
    pub fn replay(path: &Path) -> io::Result<Vec<Event>> {
        Ok(Self::scan(path)?.events)
    }

    /// Scan the log, recording the offset just past the last intact record.
    pub fn scan(path: &Path) -> io::Result<Replay> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Ok(Replay { events: Vec::new(), valid_len: 0, file_len: 0 });
            }
            Err(e) => return Err(e),
        };
        let file_len = file.metadata()?.len();
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0u64;
        while let Some((event, size)) = decode_record(&mut reader)? {
            events.push(event);
            valid_len += size;
        }
        if events.is_empty() && file_len > 0 {
            tracing::warn!("WAL {} has {file_len} bytes but no intact records", path.display());
        }
        Ok(Replay { events, valid_len, file_len })
    }

    /// Replay, then truncate any torn or corrupt tail so the next append
    /// follows the last intact record.
    pub fn recover(path: &Path) -> io::Result<Vec<Event>> {
        let replay = Self::scan(path)?;
        if replay.valid_len < replay.file_len {
            tracing::warn!(
                "WAL {}: dropping {} trailing bytes after {} intact records",
                path.display(),
                replay.file_len - replay.valid_len,
                replay.events.len()
            );
            let file = OpenOptions::new().write(true).open(path)?;
            file.set_len(replay.valid_len)?;
            file.sync_all()?;
        }
        Ok(replay.events)
    }
}
