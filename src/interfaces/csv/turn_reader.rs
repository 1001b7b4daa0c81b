use crate::application::ussd::UssdRequest;
use crate::error::{Result, VoteError};
use std::io::Read;

/// Reads USSD turns from a CSV source.
///
/// Expected header: `session_id,msisdn,network,new_session,user_data`.
pub struct TurnReader<R: Read> {
    reader: csv::Reader<R>,
}

impl<R: Read> TurnReader<R> {
    pub fn new(source: R) -> Self {
        let reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .flexible(true)
            .from_reader(source);
        Self { reader }
    }

    /// Lazily deserializes turns; a malformed row yields an error and the
    /// iterator carries on with the next one.
    pub fn turns(self) -> impl Iterator<Item = Result<UssdRequest>> {
        self.reader
            .into_deserialize()
            .map(|result| result.map_err(VoteError::from))
    }
}
