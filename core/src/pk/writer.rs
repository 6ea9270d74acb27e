use std::{
    fs::{File, OpenOptions},
    io::{self, Seek, SeekFrom, Write},
    ops::Range,
    sync::mpsc::{self, Receiver, Sender},
    thread::JoinHandle,
};

use crate::error::{Result, ScfError};

use super::{
    buffer::{PkBuffer, Stream},
    storage::{label, PkFile},
};

const F64_SIZE: u64 = std::mem::size_of::<f64>() as u64;

/// Identifies one issued flush. Handles are never reused.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct JobHandle(u64);

/// State of one buffer slot of a writer.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum SlotState {
    Idle,
    Filling,
    FlushPending(JobHandle),
}

/// One contiguous write of a buffer section into a record.
#[derive(Clone, Debug)]
struct WriteJob {
    label: String,
    stream: Stream,
    /// Cells of the buffer, relative to its window start
    local: Range<usize>,
    /// Absolute byte offset in the data file
    file_offset: u64,
}

struct FlushRequest {
    slot: usize,
    handle: JobHandle,
    buffer: PkBuffer,
    jobs: Vec<WriteJob>,
}

struct Completion {
    slot: usize,
    handle: JobHandle,
    buffer: PkBuffer,
    result: io::Result<()>,
}

/// Owns a pool of [`PkBuffer`]s and a background thread that writes full buffers to a
/// [`PkFile`] while the next buffer is being filled.
///
/// A buffer handed to the thread is moved there and only comes back once all its writes
/// finished, so it can never be refilled while a write is outstanding.
pub struct AsyncBufferWriter {
    buffers: Vec<Option<PkBuffer>>,
    states: Vec<SlotState>,
    active: usize,
    next_handle: u64,
    sender: Option<Sender<FlushRequest>>,
    completions: Receiver<Completion>,
    thread: Option<JoinHandle<()>>,
}

impl AsyncBufferWriter {
    /// Open `file` for writing with `n_slots` buffers of `buffer_size` doubles each.
    pub fn new(file: &PkFile, n_slots: usize, buffer_size: usize) -> Result<Self> {
        let n_slots = n_slots.max(1);
        // every writer has its own handle, so seeking never interferes with another writer
        let handle = OpenOptions::new().write(true).open(file.path())?;

        let (sender, requests) = mpsc::channel::<FlushRequest>();
        let (done, completions) = mpsc::channel::<Completion>();

        let thread = std::thread::Builder::new()
            .name("pk-writer".into())
            .spawn(move || write_loop(handle, requests, done))?;

        log::debug!("writer started with {n_slots} buffers of {buffer_size} doubles");

        Ok(Self {
            buffers: (0..n_slots).map(|_| Some(PkBuffer::new(buffer_size))).collect(),
            states: vec![SlotState::Idle; n_slots],
            active: 0,
            next_handle: 0,
            sender: Some(sender),
            completions,
            thread: Some(thread),
        })
    }

    pub fn state(&self, slot: usize) -> SlotState {
        self.states[slot]
    }

    pub fn active_slot(&self) -> usize {
        self.active
    }

    /// Make the active slot the target for integrals with global indices starting at
    /// `start`, waiting for its previous flush if needed.
    pub fn begin(&mut self, start: usize) -> Result<&PkBuffer> {
        let slot = self.active;
        self.wait_for_slot(slot)?;

        let buffer = self.buffers[slot]
            .as_mut()
            .ok_or(ScfError::WriterDisconnected)?;
        buffer.set_start(start);
        self.states[slot] = SlotState::Filling;

        log::trace!("slot {slot} filling from index {start}");
        Ok(&*buffer)
    }

    /// Hand the active buffer to the writer thread and rotate to the next slot.
    ///
    /// Self-paired elements are halved first. The buffer window is clipped to the end of
    /// the supermatrix and split along the batches it overlaps.
    pub fn flush(&mut self, file: &PkFile) -> Result<JobHandle> {
        let slot = self.active;
        if self.states[slot] != SlotState::Filling {
            return Err(ScfError::InactiveBuffer { slot });
        }

        let mut buffer = self.buffers[slot]
            .take()
            .ok_or(ScfError::WriterDisconnected)?;
        buffer.halve_diagonal();

        let jobs = match write_jobs(&buffer, file) {
            Ok(jobs) => jobs,
            Err(error) => {
                buffer.zero();
                self.buffers[slot] = Some(buffer);
                self.states[slot] = SlotState::Idle;
                return Err(error);
            }
        };

        let handle = JobHandle(self.next_handle);
        self.next_handle += 1;

        let sender = self.sender.as_ref().ok_or(ScfError::WriterDisconnected)?;
        sender
            .send(FlushRequest {
                slot,
                handle,
                buffer,
                jobs,
            })
            .map_err(|_| ScfError::WriterDisconnected)?;

        self.states[slot] = SlotState::FlushPending(handle);
        self.active = (slot + 1) % self.states.len();

        log::trace!("slot {slot} flushing as job {}", handle.0);
        Ok(handle)
    }

    /// Block until `slot` has no outstanding write. The returned buffer is zeroed.
    pub fn wait_for_slot(&mut self, slot: usize) -> Result<()> {
        while let SlotState::FlushPending(_) = self.states[slot] {
            self.receive()?;
        }
        Ok(())
    }

    /// Block until every outstanding write finished.
    pub fn synchronize(&mut self) -> Result<()> {
        for slot in 0..self.states.len() {
            self.wait_for_slot(slot)?;
        }
        Ok(())
    }

    fn receive(&mut self) -> Result<()> {
        let Completion {
            slot,
            handle,
            mut buffer,
            result,
        } = self
            .completions
            .recv()
            .map_err(|_| ScfError::WriterDisconnected)?;

        debug_assert_eq!(self.states[slot], SlotState::FlushPending(handle));
        buffer.zero();
        self.buffers[slot] = Some(buffer);
        self.states[slot] = SlotState::Idle;

        log::trace!("job {} of slot {slot} completed", handle.0);
        Ok(result?)
    }
}

impl Drop for AsyncBufferWriter {
    fn drop(&mut self) {
        for (slot, state) in self.states.iter().enumerate() {
            if *state == SlotState::Filling {
                log::warn!("buffer {slot} dropped while filling, its integrals were never written");
            }
        }

        if let Err(error) = self.synchronize() {
            log::error!("outstanding PK writes failed: {error}");
        }

        // closing the channel ends the write loop
        self.sender.take();
        if let Some(thread) = self.thread.take() {
            if thread.join().is_err() {
                log::error!("PK writer thread panicked");
            }
        }
    }
}

fn write_jobs(buffer: &PkBuffer, file: &PkFile) -> Result<Vec<WriteJob>> {
    let window = buffer.window();
    let end_of_data = file.batches().last().map(|batch| batch.index_max).unwrap_or(0);
    let (start, stop) = (window.start, window.end.min(end_of_data));

    if stop <= start {
        return Err(ScfError::InvalidWindow { start, stop });
    }

    let mut jobs = Vec::new();
    for (number, batch) in file.batches().iter().enumerate() {
        let first = start.max(batch.index_min);
        let last = stop.min(batch.index_max);
        if last <= first {
            continue;
        }

        for stream in [Stream::J, Stream::K] {
            let label = label(stream, number);
            let record = file.record(&label)?;

            jobs.push(WriteJob {
                stream,
                local: first - start..last - start,
                file_offset: record.offset + (first - batch.index_min) as u64 * F64_SIZE,
                label,
            });
        }
    }
    Ok(jobs)
}

fn write_loop(mut file: File, requests: Receiver<FlushRequest>, done: Sender<Completion>) {
    for FlushRequest {
        slot,
        handle,
        buffer,
        jobs,
    } in requests
    {
        let result = jobs.iter().try_for_each(|job| {
            log::trace!(
                "writing {} doubles of {} at byte {}",
                job.local.len(),
                job.label,
                job.file_offset
            );
            file.seek(SeekFrom::Start(job.file_offset))?;
            file.write_all(&buffer.bytes(job.stream, job.local.clone()))
        });

        let completion = Completion {
            slot,
            handle,
            buffer,
            result,
        };
        if done.send(completion).is_err() {
            // the owning writer is gone, nobody is waiting for this buffer anymore
            break;
        }
    }
}
