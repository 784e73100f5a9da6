pub mod set_union;
