fn main() -> anyhow::Result<()> {
    funcctl::run()
}
