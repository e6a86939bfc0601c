#![allow(dead_code)]

use std::fs::File;
use std::process::exit;

use chrono::{DateTime, Utc};
use clap::{Args, Parser, Subcommand};
use itertools::Itertools;
use log::{error, info, warn};

use admission::process_arrival;
use booking::{BookingId, BookingStatus, Owner};
use capacity::SegmentLoad;
use config::{parse_config, ServiceConfig};
use lifecycle::{MirrorOutcome, ReviewOutcome, TransitionOutcome};
use primitives::Millis;
use priority::BoardingQueue;
use reserve::{BookingRequest, SubmitOutcome};
use route::{Direction, Segment};
use schedule::DayBucket;
use shuttle::Shuttle;
use stop::{parse_stops, StopId, StopRegistry};
use store::sqlite_store::SqliteStore;
use store::BookingStore;
use test::random_samples;

mod admission;
mod booking;
mod capacity;
mod col;
mod config;
mod lifecycle;
mod primitives;
mod priority;
mod reserve;
mod route;
mod schedule;
mod shuttle;
mod stop;
mod store;
mod test;

#[derive(Parser, Debug)]
#[command(
    version,
    author,
    about = "Seat allocation and boarding admission for a fixed-route shuttle"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Clone, Debug)]
enum Commands {
    #[command(about = "Show the seats left between two stops on a departure")]
    Seats(SeatsArgs),

    #[command(about = "Book seats between two stops")]
    Book(BookArgs),

    #[command(about = "Process the shuttle's arrival at a stop")]
    Arrive(ArriveArgs),

    #[command(about = "Print today's boarding queue")]
    Queue(QueueArgs),

    #[command(about = "Print today's segment loads")]
    Load(LoadArgs),

    #[command(about = "Accept a pending booking")]
    Accept(BookingArgs),

    #[command(about = "Cancel a booking")]
    Cancel(BookingArgs),

    #[command(about = "Mark a ride as completed")]
    Complete(BookingArgs),

    #[command(about = "Review a completed ride")]
    Review(ReviewArgs),

    #[command(about = "List the bookings of a rider")]
    Mine(MineArgs),

    #[command(about = "Estimate the travel time between two stops")]
    Eta(EtaArgs),

    #[command(about = "Run randomized booking days and check the boarding invariants")]
    Simulate(SimulateArgs),
}

#[derive(Args, Clone, Debug)]
struct ServiceArgs {
    #[arg(
        short = 'd',
        long,
        default_value = "shuttle-bookings.sqlite3",
        help = "The booking database."
    )]
    db: String,

    #[arg(
        long,
        help = "A `key;value` config file. Without one the reference nine-stop line is used."
    )]
    config: Option<String>,

    #[arg(
        long,
        help = "A stops file with columns [stop_id, title, latitude, longitude, order]."
    )]
    stops: Option<String>,
}

struct Service {
    config: ServiceConfig,
    registry: Option<StopRegistry>,
    store: SqliteStore,
}

fn open_service(args: &ServiceArgs) -> Service {
    let registry = args.stops.as_ref().map(|path| {
        let file = File::open(path).unwrap_or_else(|it| {
            error!("Could not open stops file {}: {}", path, it);
            exit(1);
        });
        parse_stops(file).unwrap_or_else(|it| {
            error!("Could not parse stops file {}:\n{:#?}", path, it);
            exit(1);
        })
    });
    let config = match &args.config {
        Some(path) => {
            let file = File::open(path).unwrap_or_else(|it| {
                error!("Could not open config file {}: {}", path, it);
                exit(1);
            });
            parse_config(file, registry.as_ref()).unwrap_or_else(|it| {
                error!("Could not parse config file {}: {}", path, it);
                exit(1);
            })
        }
        None => {
            info!("No config given, using the reference line");
            ServiceConfig::reference()
        }
    };
    let store = SqliteStore::open(&args.db).unwrap_or_else(|it| {
        error!("Could not open booking database {}: {}", args.db, it);
        exit(1);
    });
    Service {
        config,
        registry,
        store,
    }
}

fn now() -> Millis {
    Utc::now().timestamp_millis()
}

fn format_time(at: Millis, config: &ServiceConfig) -> String {
    DateTime::from_timestamp_millis(at)
        .map(|it| {
            it.with_timezone(&config.utc_offset)
                .format("%Y-%m-%d %H:%M")
                .to_string()
        })
        .unwrap_or_else(|| at.to_string())
}

#[derive(Args, Clone, Debug)]
struct SeatsArgs {
    #[arg(short, long, help = "The stop to board at.")]
    pickup: String,

    #[arg(short = 'o', long, help = "The stop to leave at.")]
    dropoff: String,

    #[arg(short, long, help = "The departure, e.g. \"7:00 AM\".")]
    slot: String,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_seats(args: &SeatsArgs) {
    let service = open_service(&args.service);
    let quote = reserve::quote(
        &service.store,
        &service.config,
        &StopId::new(&args.pickup),
        &StopId::new(&args.dropoff),
        &args.slot,
        now(),
    )
    .unwrap_or_else(|it| {
        error!("Could not look up seats: {}", it);
        exit(1);
    });
    println!(
        "{} {} departure at {}: {} of {} seats left",
        quote.direction,
        quote.slot_label,
        format_time(quote.scheduled_at, &service.config),
        quote.seats.remaining,
        service.config.capacity
    );
    for (segment, riders) in quote
        .seats
        .by_segment
        .iter()
        .sorted_by(|a, b| a.0.cmp(b.0))
    {
        println!("  {}: {} booked", segment, riders);
    }
}

#[derive(Args, Clone, Debug)]
struct BookArgs {
    #[arg(short, long, help = "The stop to board at.")]
    pickup: String,

    #[arg(short = 'o', long, help = "The stop to leave at.")]
    dropoff: String,

    #[arg(short, long, help = "The departure, e.g. \"7:00 AM\".")]
    slot: String,

    #[arg(short, long, default_value_t = 1, help = "The number of riders.")]
    riders: u32,

    #[arg(
        short,
        long,
        help = "The account to book for. Without one the booking is made as a new guest."
    )]
    user: Option<String>,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_book(args: &BookArgs) {
    let mut service = open_service(&args.service);
    let mut rng = rand::rng();
    let owner = match &args.user {
        Some(user) => Owner::User(user.as_str().into()),
        None => Owner::new_guest(&mut rng),
    };
    let request = BookingRequest {
        pickup: StopId::new(&args.pickup),
        dropoff: StopId::new(&args.dropoff),
        riders: args.riders,
        slot_label: args.slot.clone(),
        owner,
    };
    let outcome = reserve::submit(&mut service.store, &service.config, request, now(), &mut rng)
        .unwrap_or_else(|it| {
            error!("Could not book: {}", it);
            exit(1);
        });
    match outcome {
        SubmitOutcome::Created(booking) => println!(
            "Booked {} for {} riders, {} -> {} at {}. Code {}, rider {}",
            booking.id,
            booking.riders,
            booking.pickup,
            booking.dropoff,
            format_time(booking.scheduled_at, &service.config),
            booking.code,
            booking.owner.key()
        ),
        SubmitOutcome::InsufficientSeats { requested, quote } => {
            println!(
                "Only {} seats left on the {} departure, {} requested",
                quote.seats.remaining, quote.slot_label, requested
            );
            exit(2);
        }
    }
}

#[derive(Args, Clone, Debug)]
struct ArriveArgs {
    #[arg(short, long, help = "The stop the shuttle arrived at.")]
    stop: Option<String>,

    #[arg(
        long,
        help = "Ride the whole loop once, arriving at every stop of the stops file in order."
    )]
    round: bool,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn print_arrival(report: &admission::AdmissionReport) {
    println!(
        "{}: {} admitted, {} still waiting",
        report.stop,
        report.admitted.len(),
        report.rejected.len()
    );
    for id in &report.admitted {
        println!("  accepted {}", id);
    }
    for rejection in &report.rejected {
        println!(
            "  no room for {} ({} riders): {} carries {}",
            rejection.booking, rejection.riders, rejection.segment, rejection.load
        );
    }
    for (id, err) in &report.failed {
        println!("  could not accept {}: {}", id, err);
    }
}
fn main_arrive(args: &ArriveArgs) {
    let mut service = open_service(&args.service);
    if args.round {
        let Some(registry) = &service.registry else {
            error!("Riding the loop needs a stops file");
            exit(1);
        };
        let mut shuttle = Shuttle::new(registry);
        for _ in 0..shuttle.stops().len() {
            if let Some(report) =
                shuttle.advance_and_process(&mut service.store, &service.config, now())
            {
                print_arrival(&report);
            }
        }
        return;
    }
    let Some(stop) = &args.stop else {
        error!("Either --stop or --round is required");
        exit(1);
    };
    let report = process_arrival(
        &mut service.store,
        &service.config,
        &StopId::new(stop),
        now(),
    );
    print_arrival(&report);
    if let Some(err) = &report.load_error {
        error!("Arrival was not processed: {}", err);
        exit(1);
    }
}

#[derive(Args, Clone, Debug)]
struct QueueArgs {
    #[arg(short, long, help = "The stop the shuttle is at.")]
    stop: Option<String>,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_queue(args: &QueueArgs) {
    let service = open_service(&args.service);
    let day = DayBucket::containing(now(), service.config.utc_offset);
    let bookings = service
        .store
        .bookings_in_day(None, day, &BookingStatus::ACTIVE)
        .unwrap_or_else(|it| {
            error!("Could not load bookings: {}", it);
            exit(1);
        });
    let stop = args.stop.as_ref().map(StopId::new);
    let queue = BoardingQueue::build(&bookings, stop.as_ref());
    for (score, booking) in queue.scored() {
        println!(
            "{} {:>4} {:<9} {} -> {} {} riders at {}",
            score,
            booking.id,
            booking.status,
            booking.pickup,
            booking.dropoff,
            booking.riders,
            format_time(booking.scheduled_at, &service.config)
        );
    }
}

#[derive(Args, Clone, Debug)]
struct LoadArgs {
    #[arg(long, help = "Only count accepted bookings.")]
    accepted: bool,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_load(args: &LoadArgs) {
    let service = open_service(&args.service);
    let day = DayBucket::containing(now(), service.config.utc_offset);
    let statuses: &[BookingStatus] = if args.accepted {
        &[BookingStatus::Accepted]
    } else {
        &BookingStatus::ACTIVE
    };
    for direction in Direction::ALL {
        let bookings = service
            .store
            .bookings_in_day(Some(direction), day, statuses)
            .unwrap_or_else(|it| {
                error!("Could not load bookings: {}", it);
                exit(1);
            });
        let load = SegmentLoad::from_bookings(&bookings);
        println!("{}", direction);
        let mut stops = service.config.route.stops().iter().collect_vec();
        if direction == Direction::Southbound {
            stops.reverse();
        }
        for (from, to) in stops.into_iter().tuple_windows() {
            let segment = Segment::new(from.clone(), to.clone());
            let riders = load.load(&segment);
            if riders > service.config.capacity {
                warn!("{} is over capacity", segment);
            }
            println!("  {}: {}/{}", segment, riders, service.config.capacity);
        }
    }
}

#[derive(Args, Clone, Debug)]
struct BookingArgs {
    #[arg(short, long, help = "The booking id.")]
    id: u64,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn print_transition(outcome: &TransitionOutcome) {
    println!("{}: {} -> {}", outcome.booking, outcome.from, outcome.to);
    if let MirrorOutcome::Stale(err) = &outcome.mirror {
        println!("  the rider's copy was not updated: {}", err);
    }
}
fn main_transition(args: &BookingArgs, to: BookingStatus) {
    let mut service = open_service(&args.service);
    let outcome = lifecycle::transition(&mut service.store, BookingId(args.id), to, now())
        .unwrap_or_else(|it| {
            error!("Could not update booking: {}", it);
            exit(1);
        });
    print_transition(&outcome);
}

#[derive(Args, Clone, Debug)]
struct ReviewArgs {
    #[arg(short, long, help = "The booking id.")]
    id: u64,

    #[arg(short, long, help = "Stars from 1 to 5.")]
    rating: u8,

    #[arg(short, long, help = "An optional comment.")]
    text: Option<String>,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_review(args: &ReviewArgs) {
    let mut service = open_service(&args.service);
    let outcome = lifecycle::submit_review(
        &mut service.store,
        BookingId(args.id),
        args.rating,
        args.text.as_deref(),
        now(),
    )
    .unwrap_or_else(|it| {
        error!("Could not review booking: {}", it);
        exit(1);
    });
    match outcome {
        ReviewOutcome::Recorded(review) => {
            println!("Thanks! {} stars recorded for {}", review.rating, args.id)
        }
        ReviewOutcome::AlreadyReviewed(review) => println!(
            "Booking {} was already reviewed with {} stars",
            args.id, review.rating
        ),
    }
}

#[derive(Args, Clone, Debug)]
struct MineArgs {
    #[arg(short, long, help = "The account id.")]
    user: Option<String>,

    #[arg(short, long, help = "The guest id handed out when booking.")]
    guest: Option<String>,

    #[clap(flatten)]
    service: ServiceArgs,
}
fn main_mine(args: &MineArgs) {
    let service = open_service(&args.service);
    let Some(owner) = Owner::from_ids(args.user.clone(), args.guest.clone()) else {
        error!("Either --user or --guest is required");
        exit(1);
    };
    let copies = service.store.owner_bookings(&owner).unwrap_or_else(|it| {
        error!("Could not load bookings: {}", it);
        exit(1);
    });
    for copy in copies {
        match service.store.booking(copy.booking) {
            Ok(booking) => println!(
                "{} {:<9} {} -> {} {} riders at {}, code {}",
                booking.id,
                copy.status,
                booking.pickup,
                booking.dropoff,
                booking.riders,
                format_time(booking.scheduled_at, &service.config),
                booking.code
            ),
            Err(err) => {
                warn!("Rider copy of {} has no booking: {}", copy.booking, err);
                println!("{} {:<9}", copy.booking, copy.status);
            }
        }
    }
}

#[derive(Args, Clone, Debug)]
struct EtaArgs {
    #[arg(short, long, help = "The stop the shuttle is at.")]
    from: String,

    #[arg(short, long, help = "The stop to estimate the arrival at.")]
    to: String,

    #[arg(long, help = "A stops file with columns [stop_id, title, latitude, longitude, order].")]
    stops: String,
}
fn main_eta(args: &EtaArgs) {
    let file = File::open(&args.stops).unwrap_or_else(|it| {
        error!("Could not open stops file {}: {}", args.stops, it);
        exit(1);
    });
    let registry = parse_stops(file).unwrap_or_else(|it| {
        error!("Could not parse stops file {}:\n{:#?}", args.stops, it);
        exit(1);
    });
    let mut shuttle = Shuttle::new(&registry);
    if !shuttle.park_at(&StopId::new(&args.from)) {
        error!("Unknown stop: {}", args.from);
        exit(1);
    }
    match shuttle.eta_minutes_to(&StopId::new(&args.to)) {
        Some(minutes) => println!("{} min", minutes),
        None => {
            error!("Unknown stop: {}", args.to);
            exit(1);
        }
    }
}

#[derive(Args, Clone, Debug)]
struct SimulateArgs {
    #[arg(short, long, default_value_t = 10, help = "The number of random days.")]
    samples: u64,
}

fn main() {
    env_logger::builder().parse_env("LOG").init();
    let cli = Cli::parse();

    match cli.command {
        Commands::Seats(args) => main_seats(&args),
        Commands::Book(args) => main_book(&args),
        Commands::Arrive(args) => main_arrive(&args),
        Commands::Queue(args) => main_queue(&args),
        Commands::Load(args) => main_load(&args),
        Commands::Accept(args) => main_transition(&args, BookingStatus::Accepted),
        Commands::Cancel(args) => main_transition(&args, BookingStatus::Cancelled),
        Commands::Complete(args) => main_transition(&args, BookingStatus::Completed),
        Commands::Review(args) => main_review(&args),
        Commands::Mine(args) => main_mine(&args),
        Commands::Eta(args) => main_eta(&args),
        Commands::Simulate(args) => random_samples::run_samples(args.samples),
    }
}
