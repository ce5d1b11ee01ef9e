use crate::CLAP_STYLING;
use clap::{Arg, arg, command};
use mugsampler_core::config::{DEFAULT_IMAGE_PATTERN, DEFAULT_ROOT_URL};
use url::Url;

fn state_dir_arg() -> Arg {
    arg!(-d --"state-dir" <PATH>)
        .required(false)
        .help("Directory holding the sampling progress and photo ledger")
        .default_value(".")
}

fn backend_arg() -> Arg {
    arg!(-b --"backend" <BACKEND>)
        .required(false)
        .help("How sampling state is stored: json documents or an sqlite database")
        .value_parser(["json", "sqlite"])
        .default_value("json")
}

fn bucket_dir_arg() -> Arg {
    arg!(--"bucket-dir" <PATH>)
        .required(false)
        .help("Store photos as files in this directory")
        .default_value("photos")
        .conflicts_with("gcs-bucket")
}

fn gcs_bucket_arg() -> Arg {
    arg!(--"gcs-bucket" <BUCKET>)
        .required(false)
        .help("Upload photos to this Google Cloud Storage bucket (token from GCS_ACCESS_TOKEN)")
}

fn seed_arg() -> Arg {
    arg!(--"seed" <SEED>)
        .required(false)
        .help("Seed the random sampler to replay the same choices")
        .value_parser(clap::value_parser!(u64))
}

fn timeout_arg() -> Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Request timeout in seconds")
        .value_parser(clap::value_parser!(u64).range(1..))
        .default_value("30")
}

fn image_pattern_arg() -> Arg {
    arg!(--"image-pattern" <REGEX>)
        .required(false)
        .help("Only image URLs matching this pattern are collected")
        .default_value(DEFAULT_IMAGE_PATTERN)
}

fn verbose_arg() -> Arg {
    arg!(-v --"verbose")
        .required(false)
        .help("Log every step")
        .action(clap::ArgAction::SetTrue)
}

fn count_arg(arg: Arg, default: &'static str) -> Arg {
    arg.required(false)
        .value_parser(clap::value_parser!(u64).range(1..))
        .default_value(default)
}

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("mugsampler")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("mugsampler")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .subcommand_required(false)
        .subcommand(
            command!("run")
                .about(
                    "Sample photos from the listing tree, repeating cycles until one collects \
                enough new photos.",
                )
                .arg(count_arg(
                    arg!(--"max-states" <N>).help("States sampled per cycle"),
                    "50",
                ))
                .arg(count_arg(
                    arg!(--"max-counties" <N>).help("Counties sampled per state"),
                    "2",
                ))
                .arg(count_arg(
                    arg!(--"max-az-filters" <N>).help("A-Z filters sampled per county"),
                    "2",
                ))
                .arg(count_arg(
                    arg!(--"max-photos" <N>).help("Photos sampled per leaf page"),
                    "20",
                ))
                .arg(count_arg(
                    arg!(--"min-photos" <N>).help("New photos a cycle must collect to finish the run"),
                    "5000",
                ))
                .arg(
                    arg!(--"max-cycles" <N>)
                        .required(false)
                        .help("Give up after this many cycles (0 for no limit)")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("100"),
                )
                .arg(
                    arg!(--"max-idle-cycles" <N>)
                        .required(false)
                        .help("Give up after this many consecutive cycles with no new photos (0 for no limit)")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("3"),
                )
                .arg(
                    arg!(--"max-minutes" <MINUTES>)
                        .required(false)
                        .help("Do not start a new cycle after this many minutes")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(
                    arg!(-u --"root-url" <URL>)
                        .required(false)
                        .help("The listing of states to start from")
                        .value_parser(clap::value_parser!(Url))
                        .default_value(DEFAULT_ROOT_URL),
                )
                .arg(state_dir_arg())
                .arg(backend_arg())
                .arg(bucket_dir_arg())
                .arg(gcs_bucket_arg())
                .arg(seed_arg())
                .arg(timeout_arg())
                .arg(
                    arg!(--"delay-ms" <MILLIS>)
                        .required(false)
                        .help("Minimum pause between requests in milliseconds")
                        .value_parser(clap::value_parser!(u64))
                        .default_value("0"),
                )
                .arg(
                    arg!(--"dedup-states")
                        .required(false)
                        .help("Skip states whose counties have all been sampled")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(image_pattern_arg())
                .arg(verbose_arg().help("Log every step instead of showing a spinner")),
        )
        .subcommand(
            command!("collect")
                .about("Upload every matching photo on one page that has not been sampled yet")
                .arg(
                    Arg::new("url")
                        .value_name("URL")
                        .required(true)
                        .help("The page to collect photos from")
                        .value_parser(clap::value_parser!(Url)),
                )
                .arg(
                    arg!(--"max-photos" <N>)
                        .required(false)
                        .help("Upload at most this many randomly chosen photos (default: all)")
                        .value_parser(clap::value_parser!(u64).range(1..)),
                )
                .arg(state_dir_arg())
                .arg(backend_arg())
                .arg(bucket_dir_arg())
                .arg(gcs_bucket_arg())
                .arg(seed_arg())
                .arg(timeout_arg())
                .arg(image_pattern_arg())
                .arg(verbose_arg()),
        )
        .subcommand(
            command!("status")
                .about("Show how much of the tree has been sampled so far")
                .arg(state_dir_arg())
                .arg(backend_arg()),
        )
        .subcommand(
            command!("reset")
                .about("Forget all sampling progress and sampled photos")
                .arg(state_dir_arg())
                .arg(backend_arg())
                .arg(
                    arg!(-f --"force")
                        .help("Reset without asking for confirmation")
                        .required(false),
                ),
        )
}
