use upload_previews::args::Args;
use upload_previews::poster::{self, Ffmpeg};
use upload_previews::scanner::{self, ScanStats};
use upload_previews::store::{Credentials, HttpStoreClient};
use upload_previews::uploader;

use clap::Parser;

fn main() {
    if let Err(e) = run() {
        eprintln!("Error: {:#}", e);
        std::process::exit(1);
    }
}

fn run() -> anyhow::Result<()> {
    let args = Args::parse();
    args.validate()?;
    let skip_locales = args.skip_locales();

    println!("Collecting videos and generating posters");
    println!("\tPreviews path: {}", args.previews_path.display());
    println!("\tSkip locales: {:?}", skip_locales);
    println!("\tRegenerate posters: {}", args.regenerate_posters);

    let (previews, stats) = scanner::scan(&args.previews_path, &skip_locales);
    let generated = poster::generate_posters(&previews, args.regenerate_posters, &Ffmpeg)?;

    let credentials = Credentials::resolve(args.username, args.app_identifier, args.platform)?;
    let mut client = HttpStoreClient::from_env()?;
    let uploaded = uploader::upload_previews(&mut client, &previews, &credentials)?;

    print_summary(&stats, generated, uploaded);
    Ok(())
}

fn print_summary(stats: &ScanStats, generated: usize, uploaded: usize) {
    println!();
    println!("=== UPLOAD COMPLETE ===");
    println!("Locales visited: {}", stats.locales_visited);
    if stats.locales_skipped > 0 {
        println!("Locales skipped: {}", stats.locales_skipped);
    }
    println!("Videos found: {}", stats.videos_found);
    if stats.missing_config > 0 {
        println!("Skipped (missing configuration): {}", stats.missing_config);
    }
    if stats.invalid_config > 0 {
        println!("Skipped (invalid configuration): {}", stats.invalid_config);
    }
    println!("Posters generated: {}", generated);
    println!("Videos uploaded: {}", uploaded);
}
