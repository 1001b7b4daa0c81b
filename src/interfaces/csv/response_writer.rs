use crate::application::ussd::UssdResponse;
use crate::error::Result;
use serde::Serialize;
use std::io::Write;

#[derive(Serialize)]
struct ResponseRow<'a> {
    session_id: &'a str,
    continue_session: bool,
    message: &'a str,
}

/// Writes USSD responses as CSV rows, one per turn.
pub struct ResponseWriter<W: Write> {
    writer: csv::Writer<W>,
}

impl<W: Write> ResponseWriter<W> {
    pub fn new(sink: W) -> Self {
        Self {
            writer: csv::Writer::from_writer(sink),
        }
    }

    pub fn write(&mut self, session_id: &str, response: &UssdResponse) -> Result<()> {
        self.writer.serialize(ResponseRow {
            session_id,
            continue_session: response.continue_session,
            message: &response.message,
        })?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }
}
