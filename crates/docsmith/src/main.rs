fn main() -> anyhow::Result<()> {
    docsmith::init();
    docsmith::cli::run()
}
