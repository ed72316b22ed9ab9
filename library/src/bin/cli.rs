use nodeflow::LibraryError;
use nodeflow::run;

fn main() -> Result<(), LibraryError> {
    run(std::env::args().collect())
}
