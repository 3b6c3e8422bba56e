pub mod import_kit;
