pub mod csv_writer;
pub mod excel_writer;
pub mod html_writer;
pub mod json_writer;

pub use csv_writer::CsvWriter;
pub use excel_writer::ExcelWriter;
pub use html_writer::HtmlDocumentWriter;
pub use json_writer::JsonWriter;
