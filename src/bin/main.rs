use clap::Parser;
use std::process;

#[macro_use]
extern crate log;

#[cfg(not(target_env = "msvc"))]
#[global_allocator]
static GLOBAL: tikv_jemallocator::Jemalloc = tikv_jemallocator::Jemalloc;

/// Parse command line arguments and run `vcf_sharder::run()`.
fn main() {
    // ----------------------------- Run CLI Parser
    let cli = parser::Cli::parse();

    match vcf_sharder::run(cli) {
        Ok(()) => (),
        Err(e) => {
            error!("{e:?}");
            process::exit(1);
        }
    };
}
