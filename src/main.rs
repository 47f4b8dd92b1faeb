fn main() -> anyhow::Result<()> {
    cardgallery::cli::run()
}
