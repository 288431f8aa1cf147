//! Office Open XML package: loading, saving and the shared part readers

pub(crate) mod load;
pub(crate) mod parts;
pub(crate) mod save;
pub(crate) mod shared_strings;
pub(crate) mod sheet_xml;
pub(crate) mod xml_writer;
