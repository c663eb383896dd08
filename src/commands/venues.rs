use paper_harvest::sources::VENUES;

pub(crate) fn run_venues_command() {
    println!("{:<18} {:<18} {:<16} SITE", "TAG", "CONFERENCE", "DBLP");
    for venue in VENUES {
        println!(
            "{:<18} {:<18} {:<16} {}",
            venue.tag,
            venue.conference,
            venue.dblp_key,
            venue.site.adapter_name()
        );
    }
}
