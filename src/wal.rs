use std::fs::{self, File, OpenOptions};
use std::io::{self, BufReader, BufWriter, Read, Write};
use std::path::{Path, PathBuf};

use crate::model::Event;

/// Encode a single event as `[len][bincode][crc32]`. Returns the bytes written.
fn encode_event(writer: &mut impl Write, event: &Event) -> io::Result<u64> {
    let payload =
        bincode::serialize(event).map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    let len = payload.len() as u32;
    writer.write_all(&len.to_le_bytes())?;
    writer.write_all(&payload)?;
    writer.write_all(&crc32fast::hash(&payload).to_le_bytes())?;
    Ok(8 + payload.len() as u64)
}

/// Read exactly `buf.len()` bytes. `Ok(false)` means the log ended (cleanly
/// or mid-entry).
fn read_or_eof(reader: &mut impl Read, buf: &mut [u8]) -> io::Result<bool> {
    match reader.read_exact(buf) {
        Ok(()) => Ok(true),
        Err(e) if e.kind() == io::ErrorKind::UnexpectedEof => Ok(false),
        Err(e) => Err(e),
    }
}

/// Decode the next entry and its encoded size. `Ok(None)` at end of log, on
/// a truncated tail, or on the first corrupt entry.
fn decode_event(reader: &mut impl Read) -> io::Result<Option<(Event, u64)>> {
    let mut len_buf = [0u8; 4];
    if !read_or_eof(reader, &mut len_buf)? {
        return Ok(None);
    }
    let mut payload = vec![0u8; u32::from_le_bytes(len_buf) as usize];
    if !read_or_eof(reader, &mut payload)? {
        return Ok(None);
    }
    let mut crc_buf = [0u8; 4];
    if !read_or_eof(reader, &mut crc_buf)? {
        return Ok(None);
    }
    if u32::from_le_bytes(crc_buf) != crc32fast::hash(&payload) {
        return Ok(None);
    }
    let size = 8 + payload.len() as u64;
    Ok(bincode::deserialize::<Event>(&payload).ok().map(|e| (e, size)))
}

/// Append-only event log; the clinic's durable storage.
///
/// Format per entry: `[u32: len][bincode: Event][u32: crc32]`, little endian.
/// A torn last entry (crash mid-write) is dropped on replay and must be cut
/// off with [`Wal::truncate_tail`] before appending again.
pub struct Wal {
    writer: BufWriter<File>,
    path: PathBuf,
    /// File length covered by successful `flush_sync` calls.
    durable_len: u64,
    /// Bytes and entries appended since the last successful flush.
    pending_len: u64,
    pending_appends: u64,
    appends_since_compact: u64,
    /// Set when a failed batch could not be cut off; appends are refused
    /// until a compaction rewrites the log.
    poisoned: bool,
}

impl Wal {
    pub fn open(path: &Path) -> io::Result<Self> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        let durable_len = file.metadata()?.len();
        Ok(Self {
            writer: BufWriter::new(file),
            path: path.to_path_buf(),
            durable_len,
            pending_len: 0,
            pending_appends: 0,
            appends_since_compact: 0,
            poisoned: false,
        })
    }

    /// Append and fsync a single event. Production code batches through
    /// `append_buffered` + `flush_sync`.
    #[cfg(test)]
    pub fn append(&mut self, event: &Event) -> io::Result<()> {
        self.append_buffered(event)?;
        self.flush_sync()
    }

    pub fn append_buffered(&mut self, event: &Event) -> io::Result<()> {
        self.check_writable()?;
        self.pending_len += encode_event(&mut self.writer, event)?;
        self.pending_appends += 1;
        self.appends_since_compact += 1;
        Ok(())
    }

    pub fn flush_sync(&mut self) -> io::Result<()> {
        self.check_writable()?;
        self.writer.flush()?;
        self.writer.get_ref().sync_all()?;
        self.durable_len += self.pending_len;
        self.pending_len = 0;
        self.pending_appends = 0;
        Ok(())
    }

    /// Discard everything appended since the last successful `flush_sync`,
    /// both still-buffered bytes and any that already reached the file.
    /// If the file cannot be cut back, the log refuses further appends.
    pub fn rollback(&mut self) -> io::Result<()> {
        let result = self.cut_to_durable();
        self.poisoned = result.is_err();
        result
    }

    fn cut_to_durable(&mut self) -> io::Result<()> {
        let fresh = BufWriter::new(OpenOptions::new().append(true).open(&self.path)?);
        // into_parts hands back the buffer instead of flushing it on drop
        let (file, _unwritten) = std::mem::replace(&mut self.writer, fresh).into_parts();
        self.appends_since_compact -= self.pending_appends;
        self.pending_len = 0;
        self.pending_appends = 0;
        file.set_len(self.durable_len)?;
        file.sync_all()
    }

    fn check_writable(&self) -> io::Result<()> {
        if self.poisoned {
            return Err(io::Error::other("WAL holds an unrecoverable partial batch"));
        }
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn appends_since_compact(&self) -> u64 {
        self.appends_since_compact
    }

    /// Replace the log with `events`: write a temp file, fsync, rename over
    /// the log, reopen for append.
    pub fn compact(&mut self, events: &[Event]) -> io::Result<()> {
        let tmp_path = self.path.with_extension("wal.tmp");
        let mut written = 0;
        {
            let mut writer = BufWriter::new(File::create(&tmp_path)?);
            for event in events {
                written += encode_event(&mut writer, event)?;
            }
            writer.flush()?;
            writer.get_ref().sync_all()?;
        }
        fs::rename(&tmp_path, &self.path)?;
        let file = OpenOptions::new().create(true).append(true).open(&self.path)?;
        let (_, _unwritten) = std::mem::replace(&mut self.writer, BufWriter::new(file)).into_parts();
        self.durable_len = written;
        self.pending_len = 0;
        self.pending_appends = 0;
        self.appends_since_compact = 0;
        self.poisoned = false;
        Ok(())
    }

    /// Every valid event in the log, oldest first, and the byte length they
    /// span. Anything past that length is a torn or corrupt tail. A missing
    /// file is an empty log.
    pub fn replay(path: &Path) -> io::Result<(Vec<Event>, u64)> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok((Vec::new(), 0)),
            Err(e) => return Err(e),
        };
        let mut reader = BufReader::new(file);
        let mut events = Vec::new();
        let mut valid_len = 0;
        while let Some((event, size)) = decode_event(&mut reader)? {
            events.push(event);
            valid_len += size;
        }
        Ok((events, valid_len))
    }

    /// Cut the log back to `valid_len` (as returned by [`Wal::replay`]) so
    /// new entries follow the last good one. Returns the number of bytes
    /// dropped.
    pub fn truncate_tail(path: &Path, valid_len: u64) -> io::Result<u64> {
        let file = match OpenOptions::new().write(true).open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e),
        };
        let len = file.metadata()?.len();
        if len <= valid_len {
            return Ok(0);
        }
        file.set_len(valid_len)?;
        file.sync_all()?;
        Ok(len - valid_len)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::*;
    use chrono::NaiveDateTime;

    fn tmp_path(name: &str) -> PathBuf {
        let dir = std::env::temp_dir().join("clinic_test_wal");
        fs::create_dir_all(&dir).unwrap();
        let path = dir.join(name);
        let _ = fs::remove_file(&path);
        path
    }

    fn scheduled(id: AppointmentId) -> Event {
        let at = NaiveDateTime::parse_from_str("2031-06-01 14:30", DATE_TIME_FORMAT).unwrap();
        Event::AppointmentScheduled {
            appointment: Appointment::new(id, 1, 2, at, None),
        }
    }

    #[test]
    fn append_and_replay() {
        let path = tmp_path("append_and_replay.wal");
        let events = vec![scheduled(1), Event::AppointmentCompleted { id: 1 }];
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append(e).unwrap();
            }
        }
        assert_eq!(Wal::replay(&path).unwrap().0, events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_drops_truncated_tail() {
        let path = tmp_path("truncation.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&scheduled(1)).unwrap();
        }
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[9u8, 0, 0, 0, 1, 2]).unwrap(); // length says 9, only 2 bytes follow
        }
        assert_eq!(Wal::replay(&path).unwrap().0, vec![scheduled(1)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn replay_nonexistent_file() {
        let path = tmp_path("nonexistent.wal");
        assert!(Wal::replay(&path).unwrap().0.is_empty());
    }

    #[test]
    fn replay_stops_at_bad_crc() {
        let path = tmp_path("corrupt_crc.wal");
        {
            let payload = bincode::serialize(&Event::AppointmentCancelled { id: 3 }).unwrap();
            let mut f = File::create(&path).unwrap();
            f.write_all(&(payload.len() as u32).to_le_bytes()).unwrap();
            f.write_all(&payload).unwrap();
            f.write_all(&0xDEADBEEFu32.to_le_bytes()).unwrap();
        }
        assert!(Wal::replay(&path).unwrap().0.is_empty());
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn compact_shrinks_and_accepts_appends() {
        let path = tmp_path("compact.wal");
        let mut wal = Wal::open(&path).unwrap();
        for id in 1..=20 {
            wal.append(&scheduled(id)).unwrap();
            wal.append(&Event::AppointmentCancelled { id }).unwrap();
        }
        let before = fs::metadata(&path).unwrap().len();
        assert_eq!(wal.appends_since_compact(), 40);

        let kept = vec![scheduled(20), Event::AppointmentCancelled { id: 20 }];
        wal.compact(&kept).unwrap();
        assert_eq!(wal.appends_since_compact(), 0);
        let after = fs::metadata(&path).unwrap().len();
        assert!(after < before, "compacted log should be smaller: {after} < {before}");

        wal.append(&scheduled(21)).unwrap();
        drop(wal);
        let replayed = Wal::replay(&path).unwrap().0;
        assert_eq!(replayed.len(), 3);
        assert_eq!(replayed[2], scheduled(21));
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn buffered_appends_visible_after_flush() {
        let path = tmp_path("buffered_flush.wal");
        let events: Vec<Event> = (1..=5).map(scheduled).collect();
        {
            let mut wal = Wal::open(&path).unwrap();
            for e in &events {
                wal.append_buffered(e).unwrap();
            }
            wal.flush_sync().unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap().0, events);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn truncate_tail_lets_appends_follow_last_good_entry() {
        let path = tmp_path("truncate_tail.wal");
        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&scheduled(1)).unwrap();
        }
        let good_len = fs::metadata(&path).unwrap().len();
        {
            let mut f = OpenOptions::new().append(true).open(&path).unwrap();
            f.write_all(&[40u8, 0, 0, 0, 7, 7, 7]).unwrap();
        }

        let (events, valid_len) = Wal::replay(&path).unwrap();
        assert_eq!(events, vec![scheduled(1)]);
        assert_eq!(valid_len, good_len);
        assert_eq!(Wal::truncate_tail(&path, valid_len).unwrap(), 7);
        assert_eq!(Wal::truncate_tail(&path, valid_len).unwrap(), 0);

        {
            let mut wal = Wal::open(&path).unwrap();
            wal.append(&scheduled(2)).unwrap();
        }
        assert_eq!(Wal::replay(&path).unwrap().0, vec![scheduled(1), scheduled(2)]);
        let _ = fs::remove_file(&path);
    }

    #[test]
    fn rollback_discards_unflushed_batch() {
        let path = tmp_path("rollback.wal");
        let mut wal = Wal::open(&path).unwrap();
        wal.append(&scheduled(1)).unwrap();

        // Large enough to spill past the write buffer onto the file
        let at = NaiveDateTime::parse_from_str("2031-06-02 09:00", DATE_TIME_FORMAT).unwrap();
        let big = Event::AppointmentScheduled {
            appointment: Appointment::new(2, 1, 2, at, Some("r".repeat(64 * 1024))),
        };
        wal.append_buffered(&big).unwrap();
        wal.append_buffered(&Event::AppointmentCancelled { id: 1 }).unwrap();
        assert_eq!(wal.appends_since_compact(), 3);

        wal.rollback().unwrap();
        assert_eq!(wal.appends_since_compact(), 1);
        wal.append(&Event::AppointmentCompleted { id: 1 }).unwrap();
        drop(wal);

        assert_eq!(
            Wal::replay(&path).unwrap().0,
            vec![scheduled(1), Event::AppointmentCompleted { id: 1 }]
        );
        let _ = fs::remove_file(&path);
    }

    #[cfg(target_os = "linux")]
    #[test]
    fn failed_flush_that_cannot_roll_back_refuses_appends() {
        // Writes to /dev/full fail with ENOSPC and it cannot be truncated.
        let Ok(mut wal) = Wal::open(Path::new("/dev/full")) else {
            return;
        };
        wal.append_buffered(&scheduled(1)).unwrap();
        assert!(wal.flush_sync().is_err());
        assert!(wal.rollback().is_err());
        assert!(wal.append_buffered(&scheduled(2)).is_err());
        assert!(wal.flush_sync().is_err());
    }
}
