use crate::models::error::FocusError;

/// The rendering/capturing backend a `StreamSession` drives.
///
/// Implemented by whatever owns the actual audio path (HAL sink, capture
/// device, a test double). `start`/`pause`/`stop`/`release` report success as
/// a bool; the session maps failures to `FocusError::Operation`.
pub trait AudioStream: Send + 'static {
    fn start(&mut self) -> bool;

    fn pause(&mut self) -> bool;

    fn stop(&mut self) -> bool;

    fn release(&mut self) -> bool;

    /// Queue interleaved PCM bytes for playback. Returns bytes accepted.
    fn write(&mut self, buffer: &[u8]) -> Result<usize, FocusError>;

    /// Fill `buffer` with captured PCM bytes. Returns bytes read.
    fn read(&mut self, buffer: &mut [u8]) -> Result<usize, FocusError>;

    /// Instance volume, `0.0..=1.0`.
    fn volume(&self) -> f32;

    fn set_volume(&mut self, volume: f32) -> bool;

    fn is_running(&self) -> bool;
}
