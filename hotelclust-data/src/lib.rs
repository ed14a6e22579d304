pub mod columns;
pub mod record;
