pub mod audio;
pub mod cursor;
pub mod header;
pub mod payload;
pub mod table;

pub use audio::{AudioBuffers, AudioChannel};
pub use cursor::{SequenceCursor, StartPosition, StreamWindow};
pub use header::{read_header, Namespace, StreamHeader};
pub use payload::RawPayload;
pub use table::{
    parse_timestamp, round_to_millis, ColumnNaming, DenseRow, DenseTable, FieldUpdate,
    SparseTable, Timestamp,
};
