use clap::Parser;
use region_map::Map;
use region_map::Region;
use region_map::RegionOptions;

#[derive(Parser, Debug)]
struct Args {
    #[arg(short = 'm', long = "maps", default_value_t = 100)]
    maps: usize,

    #[arg(short = 'e', long = "entries", default_value_t = 1000)]
    entries: u32,

    #[arg(long = "max_block_size", default_value_t = RegionOptions::default().max_block_size)]
    max_block_size: usize,
}

fn main() {
    let args = Args::parse();

    let region = Region::with_options(RegionOptions {
        max_block_size: args.max_block_size,
        ..RegionOptions::default()
    });

    println!(
        "Filling {} maps with {} entries each in one region",
        args.maps, args.entries
    );

    let mut maps = Vec::with_capacity(args.maps);
    for _ in 0..args.maps {
        let mut map: Map<u32, u32> = Map::new_in(&region);
        for i in 0..args.entries {
            map.insert(i, i);
        }
        maps.push(map);
    }

    let Some(first) = maps.first() else {
        println!("Nothing to measure");
        return;
    };

    first.chain_histogram().print();
    first.debug_stats().print();

    let stats = first.debug_stats();
    let minimum = args.maps * (stats.bucket_bytes + stats.node_bytes);
    let region_stats = region.debug_stats();
    region_stats.print();

    println!(
        "Theoretical minimum: {} bytes, used: {} bytes ({:.02}% overhead)",
        minimum,
        region_stats.space_used,
        (region_stats.space_used as f64 / minimum.max(1) as f64 - 1.0) * 100.0
    );
}
