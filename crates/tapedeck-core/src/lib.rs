//! Tapedeck Core - playback orchestration engine
//!
//! Tapedeck plays media by driving external player programs. This crate
//! holds everything below the terminal interface: backends and their
//! progress parsing, the playlist and its scheduler, the timeout queue,
//! keymaps, the remote-control protocol and the coordinator tying them
//! together.

pub mod backend;
pub mod command;
pub mod entry;
pub mod event_loop;
pub mod keymap;
pub mod library;
pub mod mixer;
pub mod player;
pub mod playlist;
pub mod scheduler;
pub mod session;
pub mod status;
pub mod timeout;

pub use backend::{ Backend, BackendError, BackendRegistry, BackendSpec, PlaybackState, Position, ProgressFormat };
pub use command::{ CommandError, RemoteCommand };
pub use entry::{ EntryId, PlaylistEntry };
pub use keymap::{ Keymap, KeymapStack };
pub use mixer::{ Mixer, MixerError, VolumeAction };
pub use player::{ Completion, Player, PlayerConfig, Timed };
pub use playlist::{ Playlist, PlaylistError };
pub use scheduler::{ Direction, Scheduler };
pub use session::{ ResumeState, SessionError };
pub use timeout::{ TimeoutId, TimeoutQueue };
