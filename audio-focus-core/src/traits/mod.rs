pub mod audio_stream;
pub mod event_sink;
pub mod policy_transport;
