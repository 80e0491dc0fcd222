pub mod xdg_root;
