//! hostforge CLI entry point

fn main() -> anyhow::Result<()> {
    hostforge::run()
}
