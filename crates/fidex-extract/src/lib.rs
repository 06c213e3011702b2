pub mod pipeline;
pub mod workbook;

pub use pipeline::{
    discover_projects, equipment_pass, general_register_pass, split_projects, Discovery, RowTable,
    TrackerTables,
};
pub use workbook::{save_workbook, EQUIPMENT_SHEET};
