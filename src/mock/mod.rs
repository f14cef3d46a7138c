pub mod mock_analyser;
pub mod mock_conference;
pub mod mock_stream;
pub mod mock_track;
