fn main() {
    phasespace_pipeline::cli::run();
}
