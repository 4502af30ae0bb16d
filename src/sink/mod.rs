pub mod csv;
pub mod naming;
pub mod wav;

pub use self::csv::{write_table, write_table_to};
pub use naming::{audio_file_name, format_timestamp};
pub use wav::{write_channel, write_channels, WAV_BITS_PER_SAMPLE};
