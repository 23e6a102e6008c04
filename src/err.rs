error_chain!{
    types{
        Error, ErrorKind, ResultExt, Result;
    }

    links {

    }

    foreign_links{
        Io(::std::io::Error);
    }

    errors{
        InvalidSliceLength(expected: usize, actual: usize, ttype: &'static str) {
            description("Invalid slice length received."),
            display("Expected '{}' but got '{}' bytes for '{}'.", expected, actual, ttype),
        }

        UnknownValue(val: u64, ttype: &'static str) {
            description("Encountered unknown value."),
            display("Encountered unknown value '{}' for type '{}'.", val, ttype),
        }

        IllegalValue(val: u64, ttype: &'static str) {
            description("Encountered illegal value."),
            display("Encountered illegal value '{}' for type '{}'.", val, ttype),
        }

        UnsupportedValue(val: u64, ttype: &'static str) {
            description("Encountered unsupported value."),
            display("Encountered unsupported value '{}' for type '{}'.", val, ttype),
        }

        CouldNotReadLength(len: usize, ttype: &'static str) {
            description("Could not read length field."),
            display("Could not read '{}' byte length field of '{}'.", len, ttype),
        }

        TruncatedFrame(actual: usize) {
            description("Ethernet frame too short."),
            display("Ethernet frame has only '{}' bytes, header needs 14.", actual),
        }

        MissingMatchField(field: &'static str) {
            description("Required match field missing."),
            display("Match is missing required field '{}'.", field),
        }

        ConnectionClosed(peer: String) {
            description("Connection to switch is closed."),
            display("Connection to switch '{}' is closed.", peer),
        }
    }
}
