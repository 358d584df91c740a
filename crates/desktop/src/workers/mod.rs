pub mod detector_loader;
