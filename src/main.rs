fn main() -> anyhow::Result<()> {
    riskintel::cli::run()
}
