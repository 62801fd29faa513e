use std::env;

fn main() -> anyhow::Result<()> {
	if cfg!(debug_assertions) {
		env::set_var("RUST_BACKTRACE", "1");
	}
	diggy::run()
}
