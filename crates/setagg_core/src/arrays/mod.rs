pub mod batch;
pub mod datatype;
pub mod list;
pub mod ordfloat;
