pub mod pvc;
